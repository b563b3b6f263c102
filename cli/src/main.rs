use clap::Parser;
use eks_stacks::Cli;

#[tokio::main]
async fn main() {
    if let Err(error) = Cli::parse().run().await {
        error.exit()
    }
}
