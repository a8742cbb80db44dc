// # SMTP Notifier
//
// Sends one HTML mail per detected change over plain SMTP.
//
// ## Message
//
// - Subject: the notice's template with `{zone}` replaced
// - Body: the sending domain, then the removed, added and unchanged
//   entries, then the `spf<i>` record set the domain should publish
//
// ## Transport
//
// `server` is `host` or `host:port` (port 25 when omitted). No TLS and no
// authentication; the relay is expected to be a local or trusted MTA.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use spflat_core::traits::{ChangeNotice, Notifier};
use spflat_core::{EmailSettings, Error, Result};
use std::fmt::Write as _;

/// Default SMTP port
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Change notifier delivering through an SMTP relay
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    host: String,
    port: u16,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Create a notifier from the email settings
    ///
    /// `to` may hold several comma-separated addresses.
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: Unparseable server or address
    pub fn new(settings: &EmailSettings) -> Result<Self> {
        let (host, port) = parse_server(&settings.server)?;

        let from = parse_mailbox("from", &settings.from)?;
        let to = settings
            .to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| parse_mailbox("to", addr))
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(Error::config("email.to must name at least one recipient"));
        }

        Ok(Self {
            host,
            port,
            from,
            to,
        })
    }

    /// SMTP relay host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// SMTP relay port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Build the mail for `notice`
    pub fn build_message(&self, notice: &ChangeNotice<'_>) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notice.subject())
            .header(ContentType::TEXT_HTML);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(render_body(notice))
            .map_err(|e| Error::notifier(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &ChangeNotice<'_>) -> Result<()> {
        let message = self.build_message(notice)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
            .port(self.port)
            .build();

        transport.send(message).await.map_err(|e| {
            Error::notifier(format!(
                "Failed to send change notice via {}:{}: {}",
                self.host, self.port, e
            ))
        })?;

        tracing::info!(
            "Change notice for {} sent to {} recipient(s)",
            notice.domain,
            self.to.len()
        );
        Ok(())
    }
}

/// Split `host[:port]`
fn parse_server(server: &str) -> Result<(String, u16)> {
    let server = server.trim();
    let (host, port) = match server.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                Error::config(format!("Invalid SMTP port in email.server: {}", server))
            })?;
            (host, port)
        }
        None => (server, DEFAULT_SMTP_PORT),
    };
    if host.is_empty() {
        return Err(Error::config("email.server cannot be empty"));
    }
    Ok((host.to_string(), port))
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| Error::config(format!("Invalid email.{} address {}: {}", field, value, e)))
}

/// Render the HTML body of a change notice
pub fn render_body(notice: &ChangeNotice<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<html><body>\n<h3>SPF records for {} have changed</h3>\n",
        escape(notice.domain)
    );

    section(&mut html, "Removed", &notice.removed());
    section(&mut html, "Added", &notice.added());
    section(&mut html, "Unchanged", &notice.kept());

    let _ = writeln!(html, "<h4>Records</h4>\n<table>");
    for (index, entry) in notice.current.iter().enumerate() {
        let _ = writeln!(
            html,
            "<tr><td>spf{}.{}</td><td>TXT</td><td>{}</td></tr>",
            index,
            escape(notice.domain),
            escape(entry)
        );
    }
    html.push_str("</table>\n</body></html>\n");
    html
}

fn section(html: &mut String, title: &str, entries: &[&str]) {
    let _ = writeln!(html, "<h4>{} ({})</h4>", title, entries.len());
    if entries.is_empty() {
        return;
    }
    html.push_str("<ul>\n");
    for entry in entries {
        let _ = writeln!(html, "<li>{}</li>", escape(entry));
    }
    html.push_str("</ul>\n");
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &str, to: &str) -> EmailSettings {
        EmailSettings {
            to: to.to_string(),
            from: "spf@example.com".to_string(),
            server: server.to_string(),
            subject: "[WARNING] {zone} changed".to_string(),
            update_subject: "[NOTICE] {zone} updated".to_string(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_server_port_defaults_to_25() {
        let notifier = SmtpNotifier::new(&settings("smtp.example.com", "ops@example.com")).unwrap();
        assert_eq!(notifier.host(), "smtp.example.com");
        assert_eq!(notifier.port(), DEFAULT_SMTP_PORT);

        let notifier =
            SmtpNotifier::new(&settings("smtp.example.com:2525", "ops@example.com")).unwrap();
        assert_eq!(notifier.port(), 2525);
    }

    #[test]
    fn test_invalid_settings_are_config_errors() {
        assert!(matches!(
            SmtpNotifier::new(&settings("smtp.example.com:smtp", "ops@example.com")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SmtpNotifier::new(&settings("smtp.example.com", "not an address")),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SmtpNotifier::new(&settings(":25", "ops@example.com")),
            Err(Error::Config(_))
        ));
        assert!(SmtpNotifier::new(&settings("smtp.example.com", " , ")).is_err());
    }

    #[test]
    fn test_body_lists_changes() {
        let previous = strings(&["10.0.0.0/24", "10.0.9.0/24"]);
        let current = strings(&["10.0.0.0/24", "10.0.1.0/24"]);
        let notice = ChangeNotice {
            domain: "example.com",
            previous: &previous,
            current: &current,
            subject_template: "{zone}",
        };

        let body = render_body(&notice);
        assert!(body.contains("<h4>Removed (1)</h4>\n<ul>\n<li>10.0.9.0/24</li>"));
        assert!(body.contains("<h4>Added (1)</h4>\n<ul>\n<li>10.0.1.0/24</li>"));
        assert!(body.contains("<h4>Unchanged (1)</h4>\n<ul>\n<li>10.0.0.0/24</li>"));
        assert!(body.contains("<td>spf1.example.com</td><td>TXT</td><td>10.0.1.0/24</td>"));
    }

    #[test]
    fn test_message_headers() {
        let notifier = SmtpNotifier::new(&settings(
            "smtp.example.com",
            "ops@example.com, dns@example.com",
        ))
        .unwrap();
        let previous = strings(&["10.0.0.0/24"]);
        let current = strings(&["10.0.1.0/24"]);
        let notice = ChangeNotice {
            domain: "example.com",
            previous: &previous,
            current: &current,
            subject_template: "[NOTICE] {zone} updated",
        };

        let message = notifier.build_message(&notice).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: [NOTICE] example.com updated"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("dns@example.com"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_notifier_error() {
        let notifier = SmtpNotifier::new(&settings("127.0.0.1:1", "ops@example.com")).unwrap();
        let previous = strings(&[]);
        let current = strings(&["10.0.1.0/24"]);
        let notice = ChangeNotice {
            domain: "example.com",
            previous: &previous,
            current: &current,
            subject_template: "{zone}",
        };

        assert!(matches!(
            notifier.notify(&notice).await,
            Err(Error::Notifier(_))
        ));
    }
}
