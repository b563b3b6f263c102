/// Display global error message in unified format
#[derive(Debug)]
pub struct Error(String, Option<String>);

impl Error {
    pub fn new(message: &str, details: Option<&str>) -> Self {
        Error(message.to_string(), details.map(|d| d.to_string()))
    }

    /// Print to stderr and terminate the process
    pub fn exit(self) -> ! {
        eprintln!("\n{}\n{self}", console::style("Error").red().bold());
        std::process::exit(1)
    }
}

/// Display the message and details, as sort of a hint
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.1 {
            Some(details) => write!(f, "{}\n\n{}", self.0, console::style(details).dim()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl std::error::Error for Error {}

/// Automatically convert all eyre error reports
///
/// The whole chain of causes ends up in the details.
impl From<eyre::ErrReport> for Error {
    fn from(error: eyre::ErrReport) -> Self {
        match error.downcast::<Error>() {
            Ok(error) => error,
            Err(error) => {
                let causes: Vec<String> = error.chain().skip(1).map(|e| e.to_string()).collect();

                if causes.is_empty() {
                    Error::new(&error.to_string(), None)
                } else {
                    Error::new(&error.to_string(), Some(&causes.join("\n")))
                }
            }
        }
    }
}

impl From<eks_stacks_synth::Error> for Error {
    fn from(error: eks_stacks_synth::Error) -> Self {
        Error::new("Stacks are not consistent", Some(&error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn report_keeps_the_cause_as_details() {
        let result: eyre::Result<()> =
            Err(eyre::eyre!("Access denied")).wrap_err("Failed to delete stack");
        let error = Error::from(result.unwrap_err());

        assert_eq!(error.0, "Failed to delete stack");
        assert_eq!(error.1.as_deref(), Some("Access denied"));
    }

    #[test]
    fn wrapped_user_error_is_unwrapped() {
        let report = eyre::Report::new(Error::new("Nothing to deploy", Some("hint")));
        let error = Error::from(report);

        assert_eq!(error.0, "Nothing to deploy");
        assert_eq!(error.1.as_deref(), Some("hint"));
    }
}
