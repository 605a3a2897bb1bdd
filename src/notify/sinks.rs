use anyhow::{Context as _, Result};
use chrono::Local;
use std::fmt;
use std::io;
use tracing::field::{Field, Visit};
use tracing::{debug, warn, Event, Level, Metadata, Subscriber};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::core::config::ObserverSink;
use crate::notify::mailer::Mailer;
use crate::notify::rotating_file::RotatingFile;

/// `{timestamp} {LEVEL}: {message} [in {file}:{line}]`
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} {}: ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            meta.level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(
            writer,
            " [in {}:{}]",
            meta.file().unwrap_or("<unknown>"),
            meta.line().unwrap_or(0)
        )
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

fn error_report(meta: &Metadata<'_>, message: &str, fields: &[String]) -> String {
    let mut report = format!(
        "Time: {}\nLevel: {}\nLocation: {}:{}\nTarget: {}\n\n{}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        meta.level(),
        meta.file().unwrap_or("<unknown>"),
        meta.line().unwrap_or(0),
        meta.target(),
        message
    );
    for field in fields {
        report.push_str(field);
        report.push('\n');
    }
    report
}

/// Events the error mailer sees: ERROR from this crate only, never from the
/// SMTP or HTTP stacks underneath it.
pub fn mail_filter() -> Targets {
    Targets::new().with_target(env!("CARGO_CRATE_NAME"), Level::ERROR)
}

/// Mails each event it receives to the admins; attach it behind
/// [`mail_filter`]. Sending happens on a spawned task and needs a running
/// Tokio runtime; without one the event is skipped.
pub struct MailOnErrorLayer {
    mailer: Mailer,
    to: Vec<String>,
    subject: String,
}

impl MailOnErrorLayer {
    pub fn new(mailer: Mailer, to: Vec<String>, subject: String) -> Self {
        Self { mailer, to, subject }
    }
}

impl<S: Subscriber> Layer<S> for MailOnErrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let body = error_report(meta, &visitor.message, &visitor.fields);

        let mailer = self.mailer.clone();
        let to = self.to.clone();
        let subject = self.subject.clone();
        handle.spawn(async move {
            // WARN, not ERROR: a failing notifier must not notify about itself
            if let Err(e) = mailer.send(&to, &subject, &body).await {
                warn!("Failed to mail error report: {}", e);
            }
        });
    }
}

/// Installs the global subscriber: stdout plus every configured sink.
/// A subscriber installed earlier (tests assembling several apps) is kept.
pub fn attach(sinks: &[ObserverSink]) -> Result<()> {
    let mut mail_layer = None;
    let mut file_layer = None;

    for sink in sinks {
        match sink {
            ObserverSink::MailOnError {
                server,
                port,
                use_tls,
                credentials,
                from,
                to,
                subject,
            } => {
                let mailer = Mailer::new(server, *port, *use_tls, credentials.clone(), from)?;
                mail_layer = Some(
                    MailOnErrorLayer::new(mailer, to.clone(), subject.clone())
                        .with_filter(mail_filter()),
                );
            }
            ObserverSink::RotatingFile {
                path,
                max_bytes,
                backups,
            } => {
                let file = RotatingFile::open(path, *max_bytes, *backups)
                    .with_context(|| format!("creating log file {}", path.display()))?;
                file_layer = Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .event_format(LineFormat)
                        .with_writer(file)
                        .with_filter(LevelFilter::INFO),
                );
            }
        }
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(io::stdout);

    if let Err(e) = Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(mail_layer)
        .try_init()
    {
        debug!("Keeping existing subscriber: {}", e);
    }
    Ok(())
}
