use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};

const PLACEHOLDER: &str = "{}";

/// A command template run once per loop value.
///
/// Every `{}` in the program or its arguments is replaced by the value.
/// When no placeholder appears, the value is appended as a final argument.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    pub fn new(template: Vec<String>) -> Result<Self> {
        let mut parts = template.into_iter();
        let Some(program) = parts.next() else {
            bail!("No command given; pass it after `--`");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn has_placeholder(&self) -> bool {
        self.program.contains(PLACEHOLDER) || self.args.iter().any(|a| a.contains(PLACEHOLDER))
    }

    /// Program and arguments with `value` substituted.
    pub fn render(&self, value: &str) -> (String, Vec<String>) {
        if self.has_placeholder() {
            (
                self.program.replace(PLACEHOLDER, value),
                self.args.iter().map(|a| a.replace(PLACEHOLDER, value)).collect(),
            )
        } else {
            let mut args = self.args.clone();
            args.push(value.to_string());
            (self.program.clone(), args)
        }
    }

    /// Run for `value` and capture stdout. A non-zero exit is an error.
    pub fn output(&self, value: &str) -> Result<Vec<u8>> {
        let (program, args) = self.render(value);
        tracing::trace!("Running {} {:?}", program, args);

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to start `{}`", program))?;

        if !output.status.success() {
            bail!("`{} {}` exited with {}", program, args.join(" "), output.status);
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(parts: &[&str]) -> ShellCommand {
        ShellCommand::new(parts.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_placeholder_substitution() {
        let cmd = template(&["echo", "item-{}", "{}.txt"]);
        let (program, args) = cmd.render("7");
        assert_eq!(program, "echo");
        assert_eq!(args, vec!["item-7", "7.txt"]);
    }

    #[test]
    fn test_value_appended_without_placeholder() {
        let cmd = template(&["echo", "-n"]);
        assert_eq!(cmd.render("x").1, vec!["-n", "x"]);
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(ShellCommand::new(Vec::new()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_and_exit_status() {
        assert_eq!(template(&["echo"]).output("hi").unwrap(), b"hi\n");
        assert!(template(&["false"]).output("ignored").is_err());
    }
}
