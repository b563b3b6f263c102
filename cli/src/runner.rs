use crate::cloudformation::Client;
use crate::config::Config;
use crate::error::Error;
use crate::writer::Writer;
use eks_stacks_synth::{eks_app, App, Assembly, StackId};
use std::error::Error as StdError;

/// What every command gets to work with
pub(crate) struct Context {
    pub config: Config,
    pub writer: Writer,
}

pub(crate) trait Runner {
    fn context(&self) -> &Context;

    /// The application graph for the configured environment
    fn app(&self) -> Result<App, Error> {
        Ok(eks_app(self.context().config.environment.clone())?)
    }

    /// Synthesize all stacks, failing on audit errors
    fn assembly(&self, app: &App) -> Result<Assembly, Error> {
        Ok(app.synth()?)
    }

    /// Stack ids from command line names, all stacks when none given
    fn select(&self, app: &App, names: &[String]) -> Result<Vec<StackId>, Error> {
        let graph = app.graph()?;

        if names.is_empty() {
            return Ok(graph.plan()?.order);
        }

        let ids: Vec<StackId> = names.iter().map(|n| StackId::new(n)).collect();

        if let Some(unknown) = ids.iter().find(|id| !graph.contains(id)) {
            return Err(self.error(
                Some(&format!("Unknown stack {unknown}")),
                Some("Run `eks-stacks plan` to list the stacks"),
                None,
            ));
        }

        Ok(ids)
    }

    /// CloudFormation client for the configured region
    async fn client(&self) -> Client {
        Client::new(&self.context().config.environment.region).await
    }

    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    async fn run(&mut self) -> Result<(), Error>;

    /// Construct an error shown to the user
    fn error(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        origin: Option<Box<dyn StdError>>,
    ) -> Error {
        if let Some(origin) = origin {
            log::error!("{origin:?}");
        }

        if let Some(title) = title {
            Error::new(title, description)
        } else {
            Error::new(
                "Failed to run the command",
                Some("Run with RUST_LOG=debug for details"),
            )
        }
    }
}

/// Return a runner for a command
pub(crate) trait Runnable {
    fn runner(&self, context: &Context) -> impl Runner;
}
