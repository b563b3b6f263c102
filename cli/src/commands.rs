pub mod deploy;
pub mod destroy;
pub mod diff;
pub mod manifests;
pub mod outputs;
pub mod plan;
pub mod synth;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the templates into the cloud assembly directory
    Synth(synth::SynthCommand),

    /// Show the deployment order, waves and dependencies
    Plan(plan::PlanCommand),

    /// Compare synthesized templates with deployed stacks or a previous assembly
    Diff(diff::DiffCommand),

    /// Deploy stacks together with everything they depend on
    Deploy(deploy::DeployCommand),

    /// Delete stacks together with everything that depends on them
    Destroy(destroy::DestroyCommand),

    /// Print outputs of deployed stacks
    Outputs(outputs::OutputsCommand),

    /// Print the Kubernetes manifests of the hello application
    Manifests(manifests::ManifestsCommand),
}
