//! Delivery of run results
//!
//! Notifiers are best effort: [`notify_all`] logs each failure and carries
//! on, so a broken mail client never turns a finished report into a failed run.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info, warn};

use crate::types::{Result, XtmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success {
        subject: String,
        body: String,
        report_path: PathBuf,
    },
    /// `message` embeds the run health, so "0 of N" reads differently from a systemic abort
    Failure { subject: String, message: String },
}

impl Notice {
    pub fn subject(&self) -> &str {
        match self {
            Self::Success { subject, .. } | Self::Failure { subject, .. } => subject,
        }
    }
}

pub trait Notifier {
    fn name(&self) -> &'static str;
    fn notify(&self, notice: &Notice) -> Result<()>;
}

/// Deliver `notice` through every notifier. Returns how many succeeded.
pub fn notify_all(notifiers: &[Box<dyn Notifier>], notice: &Notice) -> usize {
    notifiers
        .iter()
        .filter(|notifier| match notifier.notify(notice) {
            Ok(()) => {
                debug!(notifier = notifier.name(), "notice delivered");
                true
            }
            Err(e) => {
                warn!(notifier = notifier.name(), error = %e, "notification failed");
                false
            }
        })
        .count()
}

/// Writes notices to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        match notice {
            Notice::Success {
                subject,
                report_path,
                ..
            } => info!(%subject, report = %report_path.display(), "report ready"),
            Notice::Failure { subject, message } => error!(%subject, %message, "report run failed"),
        }
        Ok(())
    }
}

/// Runs an AppleScript.
pub trait ScriptRunner {
    fn run(&self, script: &str) -> Result<()>;
}

/// `osascript -e <script>`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsaScript;

impl ScriptRunner for OsaScript {
    fn run(&self, script: &str) -> Result<()> {
        let output = Command::new("osascript")
            .args(["-e", script])
            .output()
            .map_err(|e| XtmError::Notify(format!("failed to run osascript: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(XtmError::Notify(format!("osascript failed: {}", stderr.trim())))
        }
    }
}

/// macOS desktop notification.
#[derive(Debug, Clone, Default)]
pub struct MacNotifier<R = OsaScript> {
    runner: R,
}

impl<R: ScriptRunner> MacNotifier<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: ScriptRunner> Notifier for MacNotifier<R> {
    fn name(&self) -> &'static str {
        "system"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        let text = match notice {
            Notice::Success { report_path, .. } => format!("Report saved to {}", report_path.display()),
            Notice::Failure { message, .. } => message.clone(),
        };
        self.runner.run(&notification_script(notice.subject(), &text))
    }
}

/// E-mails the report through Outlook, falling back to Apple Mail.
/// Failures are not mailed; they reach the operator through the other notifiers.
#[derive(Debug, Clone)]
pub struct MailNotifier<R = OsaScript> {
    recipients: Vec<String>,
    auto_send: bool,
    runner: R,
}

impl<R: ScriptRunner> MailNotifier<R> {
    pub fn new(recipients: Vec<String>, auto_send: bool, runner: R) -> Self {
        Self {
            recipients,
            auto_send,
            runner,
        }
    }
}

impl<R: ScriptRunner> Notifier for MailNotifier<R> {
    fn name(&self) -> &'static str {
        "mail"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        let Notice::Success {
            subject,
            body,
            report_path,
        } = notice
        else {
            debug!("mail notifier skips failure notices");
            return Ok(());
        };

        let email = Email {
            subject,
            body,
            recipients: &self.recipients,
            attachment: report_path,
            send: self.auto_send,
        };

        match self.runner.run(&outlook_script(&email)) {
            Ok(()) => {
                info!(recipients = self.recipients.len(), sent = self.auto_send, "Outlook message prepared");
                return Ok(());
            }
            Err(e) => warn!(error = %e, "Outlook unavailable, trying Apple Mail"),
        }

        self.runner.run(&apple_mail_script(&email))?;
        info!(recipients = self.recipients.len(), sent = self.auto_send, "Apple Mail message prepared");
        Ok(())
    }
}

struct Email<'a> {
    subject: &'a str,
    body: &'a str,
    recipients: &'a [String],
    attachment: &'a Path,
    send: bool,
}

/// Escape for an AppleScript string literal.
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn notification_script(title: &str, text: &str) -> String {
    format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(text),
        escape_applescript(title)
    )
}

fn outlook_script(email: &Email<'_>) -> String {
    let recipients: String = email
        .recipients
        .iter()
        .map(|r| {
            format!(
                "make new to recipient with properties {{email address:{{address:\"{}\"}}}}\n",
                escape_applescript(r)
            )
        })
        .collect();
    let finish = if email.send {
        "send\nend tell"
    } else {
        "end tell\nopen new_message\nactivate"
    };

    format!(
        "tell application \"Microsoft Outlook\"\n\
         set new_message to make new outgoing message with properties {{subject:\"{}\", content:\"{}\"}}\n\
         tell new_message\n\
         {}\
         make new attachment with properties {{file:POSIX file \"{}\"}}\n\
         {}\n\
         end tell",
        escape_applescript(email.subject),
        escape_applescript(email.body),
        recipients,
        escape_applescript(&email.attachment.to_string_lossy()),
        finish
    )
}

fn apple_mail_script(email: &Email<'_>) -> String {
    let recipients: String = email
        .recipients
        .iter()
        .map(|r| {
            format!(
                "make new to recipient at end of to recipients of new_message with properties {{address:\"{}\"}}\n",
                escape_applescript(r)
            )
        })
        .collect();
    let finish = if email.send {
        "send new_message"
    } else {
        "activate"
    };

    format!(
        "tell application \"Mail\"\n\
         set new_message to make new outgoing message with properties {{subject:\"{}\", visible:{}}}\n\
         tell new_message\n\
         {}\
         set the content to \"{}\"\n\
         make new attachment with properties {{file name:POSIX file \"{}\"}}\n\
         end tell\n\
         {}\n\
         end tell",
        escape_applescript(email.subject),
        !email.send,
        recipients,
        escape_applescript(email.body),
        escape_applescript(&email.attachment.to_string_lossy()),
        finish
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records scripts; fails any script that mentions `fail_on`.
    #[derive(Default)]
    struct RecordingRunner {
        scripts: RefCell<Vec<String>>,
        fail_on: Vec<&'static str>,
    }

    impl ScriptRunner for &RecordingRunner {
        fn run(&self, script: &str) -> Result<()> {
            self.scripts.borrow_mut().push(script.to_string());
            if self.fail_on.iter().any(|needle| script.contains(needle)) {
                return Err(XtmError::Notify("application not found".into()));
            }
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn notify(&self, _notice: &Notice) -> Result<()> {
            Err(XtmError::Notify("boom".into()))
        }
    }

    fn success() -> Notice {
        Notice::Success {
            subject: "XTM Monthly Report - 2024-03".into(),
            body: "Total: \"80\" words\\done".into(),
            report_path: PathBuf::from("/tmp/XTM_Monthly_Report_2024-03_20240401.json"),
        }
    }

    // ========== escaping ==========

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_applescript(r"C:\dir"), r"C:\\dir");
        assert_eq!(escape_applescript(r#"\""#), r#"\\\""#);
        assert_eq!(escape_applescript("plain"), "plain");
    }

    #[test]
    fn test_notification_script_escapes() {
        let script = notification_script("Run \"failed\"", "0 of 3");
        assert_eq!(
            script,
            r#"display notification "0 of 3" with title "Run \"failed\"""#
        );
    }

    // ========== mail ==========

    #[test]
    fn test_outlook_draft_script() {
        let runner = RecordingRunner::default();
        let notifier = MailNotifier::new(vec!["a@x.org".into(), "b@x.org".into()], false, &runner);

        notifier.notify(&success()).unwrap();

        let scripts = runner.scripts.borrow();
        assert_eq!(scripts.len(), 1);
        let script = &scripts[0];
        assert!(script.starts_with("tell application \"Microsoft Outlook\""));
        assert!(script.contains(r#"content:"Total: \"80\" words\\done""#));
        assert_eq!(script.matches("make new to recipient").count(), 2);
        assert!(script.contains("open new_message"));
        assert!(!script.contains("send"));
    }

    #[test]
    fn test_outlook_auto_send_script() {
        let runner = RecordingRunner::default();
        MailNotifier::new(vec!["a@x.org".into()], true, &runner)
            .notify(&success())
            .unwrap();
        assert!(runner.scripts.borrow()[0].contains("send\n"));
    }

    #[test]
    fn test_falls_back_to_apple_mail() {
        let runner = RecordingRunner {
            fail_on: vec!["Microsoft Outlook"],
            ..Default::default()
        };
        MailNotifier::new(vec!["a@x.org".into()], false, &runner)
            .notify(&success())
            .unwrap();

        let scripts = runner.scripts.borrow();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[1].starts_with("tell application \"Mail\""));
        assert!(scripts[1].contains("visible:true"));
    }

    #[test]
    fn test_both_clients_unavailable_is_error() {
        let runner = RecordingRunner {
            fail_on: vec!["tell application"],
            ..Default::default()
        };
        let result = MailNotifier::new(vec!["a@x.org".into()], false, &runner).notify(&success());
        assert!(matches!(result, Err(XtmError::Notify(_))));
    }

    #[test]
    fn test_mail_skips_failures() {
        let runner = RecordingRunner::default();
        let failure = Notice::Failure {
            subject: "XTM report failed".into(),
            message: "0 of 3 projects succeeded".into(),
        };
        MailNotifier::new(vec!["a@x.org".into()], false, &runner)
            .notify(&failure)
            .unwrap();
        assert!(runner.scripts.borrow().is_empty());
    }

    // ========== dispatch ==========

    #[test]
    fn test_notify_all_survives_failures() {
        let notifiers: Vec<Box<dyn Notifier>> = vec![Box::new(Broken), Box::new(LogNotifier), Box::new(Broken)];
        assert_eq!(notify_all(&notifiers, &success()), 1);
    }

    #[test]
    fn test_system_notifier_uses_failure_message() {
        let runner = RecordingRunner::default();
        MacNotifier::new(&runner)
            .notify(&Notice::Failure {
                subject: "XTM report failed".into(),
                message: "0 of 3 projects succeeded".into(),
            })
            .unwrap();
        assert!(runner.scripts.borrow()[0].contains("\"0 of 3 projects succeeded\""));
    }
}
