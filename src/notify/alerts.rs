//! Fan-out of match results to the mailer

use crate::notify::mailer::Mailer;
use crate::output::formatter::format_alert_body;
use crate::processing::matcher::MatchResult;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Outcome of one alert fan-out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Recipients whose alert was handed to the mailer
    pub delivered: Vec<String>,

    /// Recipients whose delivery failed, with the reason
    pub failed: Vec<(String, String)>,

    /// Recipients with nothing to send
    pub no_matches: Vec<String>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send one alert per recipient that has at least one matched posting.
///
/// A failed delivery is recorded and the remaining recipients are still served.
pub fn dispatch_alerts<M: Mailer + ?Sized>(matches: &MatchResult<'_>, mailer: &M, subject: &str) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for (recipient, postings) in matches {
        if postings.is_empty() {
            info!("No matching jobs for {}", recipient);
            report.no_matches.push(recipient.clone());
            continue;
        }

        let body = format_alert_body(postings);
        info!("Sending alert with {} postings to {}", postings.len(), recipient);
        match mailer.send(recipient, subject, &body) {
            Ok(()) => report.delivered.push(recipient.clone()),
            Err(e) => {
                warn!("Alert for {} failed: {}", recipient, e);
                report.failed.push((recipient.clone(), e.to_string()));
            }
        }
    }

    report
}
