use super::Executor;
use crate::command::{Action, Command, Request, Statement};
use crate::context::Context;
use crate::db::{Database, Transaction};
use crate::error::{Error, Result};
use crate::format::Dialect;
use crate::predicate::{Values, Where};
use crate::scan::{Rows, Scan};
use crate::trace::SqlLogger;

/// Executes requests inside one database transaction per call.
///
/// ```ignore
/// let exec = SqlExecutor::new(PgDatabase::connect(&url)?);
/// let mut rows: Vec<Resource> = Vec::new();
/// exec.execute(&ctx, &query("resources").into(), Some(&mut rows)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqlExecutor<D> {
    db: D,
    logger: SqlLogger,
}

enum Step<'a> {
    Statement(&'a Statement),
    Command(&'a Command),
}

fn flatten<'a>(req: &'a Request, out: &mut Vec<Step<'a>>) {
    match req {
        Request::Statement(stmt) => out.push(Step::Statement(stmt)),
        Request::Command(cmd) => out.push(Step::Command(cmd)),
        Request::Batch(reqs) => {
            for r in reqs {
                flatten(r, out);
            }
        }
    }
}

impl<D: Database> SqlExecutor<D> {
    pub fn new(db: D) -> Self {
        Self {
            db,
            logger: SqlLogger::default(),
        }
    }

    /// Replace the statement logger.
    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn dialect(&self) -> Dialect {
        self.db.dialect()
    }

    /// Map dialect deadlock codes to [`Error::Deadlock`].
    fn classify(&self, err: Error) -> Error {
        match err {
            Error::Database {
                code: Some(code),
                message,
            } if self.dialect().is_deadlock(&code) => Error::Deadlock(message),
            other => other,
        }
    }

    async fn run(
        &self,
        ctx: &Context,
        tx: &mut D::Tx,
        req: &Request,
        mut dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let mut steps = Vec::new();
        flatten(req, &mut steps);
        let last = steps.iter().rposition(|s| matches!(s, Step::Command(_)));
        for (i, step) in steps.into_iter().enumerate() {
            match step {
                Step::Statement(stmt) => {
                    self.exec(ctx, tx, stmt).await?;
                }
                Step::Command(cmd) => {
                    let dest = if Some(i) == last { dest.take() } else { None };
                    self.command(ctx, tx, cmd, dest).await?;
                }
            }
        }
        Ok(())
    }

    async fn command(
        &self,
        ctx: &Context,
        tx: &mut D::Tx,
        cmd: &Command,
        dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let stmt = self.dialect().format(cmd)?;
        match cmd.action {
            Action::Query => {
                let mut rows = self.query(ctx, tx, &stmt).await?;
                if let Some(dest) = dest {
                    dest.scan(&mut rows)?;
                }
            }
            Action::Delete => {
                if let Some(dest) = dest {
                    let doomed = Command {
                        action: Action::Query,
                        columns: Vec::new(),
                        values: Values::new(),
                        group_by: Vec::new(),
                        on_conflict: None,
                        ..cmd.clone()
                    };
                    let pre = self.dialect().format(&doomed)?;
                    let mut rows = self.query(ctx, tx, &pre).await?;
                    dest.scan(&mut rows)?;
                }
                self.exec(ctx, tx, &stmt).await?;
            }
            Action::Insert => match dest {
                None => {
                    self.exec(ctx, tx, &stmt).await?;
                }
                Some(dest) => {
                    let mut rows = match self.dialect().format_insert_returning(cmd)? {
                        Some(returning) => self.query(ctx, tx, &returning).await?,
                        None => {
                            self.exec(ctx, tx, &stmt).await?;
                            match ctx.run(tx.last_insert_id()).await? {
                                Some(id) if id > 0 => {
                                    let inserted =
                                        Command::new(Action::Query, &cmd.resource).filter("id", id);
                                    let stmt = self.dialect().format(&inserted)?;
                                    self.query(ctx, tx, &stmt).await?
                                }
                                _ => Rows::empty(),
                            }
                        }
                    };
                    dest.scan(&mut rows)?;
                }
            },
            Action::Update => {
                self.exec(ctx, tx, &stmt).await?;
                if let Some(dest) = dest {
                    let where_: Where = cmd
                        .where_
                        .iter()
                        .map(|(k, p)| match cmd.values.get(k) {
                            Some(v) => (k.clone(), v.to_predicate()),
                            None => (k.clone(), p.clone()),
                        })
                        .collect();
                    let updated = Command::new(Action::Query, &cmd.resource).where_(where_);
                    let stmt = self.dialect().format(&updated)?;
                    let mut rows = self.query(ctx, tx, &stmt).await?;
                    dest.scan(&mut rows)?;
                }
            }
        }
        Ok(())
    }

    async fn query(&self, ctx: &Context, tx: &mut D::Tx, stmt: &Statement) -> Result<Rows> {
        self.logger.log(self.dialect(), stmt);
        ctx.run(tx.query(stmt)).await
    }

    async fn exec(&self, ctx: &Context, tx: &mut D::Tx, stmt: &Statement) -> Result<u64> {
        self.logger.log(self.dialect(), stmt);
        ctx.run(tx.execute(stmt)).await
    }
}

impl<D: Database> Executor for SqlExecutor<D> {
    async fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let mut tx = ctx
            .run(self.db.begin())
            .await
            .map_err(|e| self.classify(e))?;
        match self.run(ctx, &mut tx, req, dest).await {
            Ok(()) => ctx.run(tx.commit()).await.map_err(|e| self.classify(e)),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        target: "sqlbridge.sql",
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(self.classify(err))
            }
        }
    }
}
