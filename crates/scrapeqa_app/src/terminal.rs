use std::io::{self, Write};

use chrono::{DateTime, Local};
use scrapeqa_client::UiSink;
use scrapeqa_core::{AppViewModel, NoticeLevel, Notification, Phase, ProgressView, View};

/// Prints view changes and notices to stdout.
#[derive(Default)]
pub struct TerminalSink {
    last: Option<AppViewModel>,
}

impl UiSink for TerminalSink {
    fn render(&mut self, view: &AppViewModel) {
        let lines = render_lines(self.last.as_ref(), view);
        self.last = Some(view.clone());
        write_lines(&lines);
    }

    fn notify(&mut self, notification: &Notification) {
        write_lines(&[format_notice(Local::now(), notification)]);
    }
}

fn write_lines(lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let mut out = io::stdout().lock();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    let _ = out.flush();
}

pub fn format_notice(at: DateTime<Local>, notification: &Notification) -> String {
    let marker = match notification.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "..",
        NoticeLevel::Error => "!!",
    };
    format!(
        "[{}] {} {}",
        at.format("%H:%M:%S"),
        marker,
        notification.message
    )
}

/// Lines describing what changed between two renders.
pub fn render_lines(previous: Option<&AppViewModel>, view: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();

    let switched = previous.map(|p| p.view) != Some(view.view);
    if switched {
        lines.push(format!("== {} ==", view_label(view.view)));
    }
    // A finished listing is always shown, whatever the view.
    let listed = previous.is_some_and(|p| p.listing_revision != view.listing_revision);
    if (switched && view.view == View::Manage) || listed {
        lines.extend(url_lines(view));
    }

    if previous.map(|p| &p.progress) != Some(&view.progress) {
        if let Some(progress) = &view.progress {
            lines.push(progress_line(progress));
        }
    }

    if previous.map(|p| &p.answer) != Some(&view.answer) {
        if let Some(answer) = &view.answer {
            lines.push(format!("Answer: {}", answer.text));
            if !answer.sources.is_empty() {
                lines.push("Sources:".to_string());
                lines.extend(answer.sources.iter().map(|source| format!("  - {source}")));
            }
        }
    }

    lines
}

fn view_label(view: View) -> &'static str {
    match view {
        View::Scrape => "Scrape",
        View::Ask => "Ask",
        View::Manage => "Manage",
    }
}

fn url_lines(view: &AppViewModel) -> Vec<String> {
    if view.scraped_urls.is_empty() {
        return vec!["No URLs scraped yet.".to_string()];
    }
    let mut lines = vec![format!("Scraped URLs ({}):", view.scraped_url_count)];
    lines.extend(view.scraped_urls.iter().map(|url| format!("  {url}")));
    lines
}

fn progress_line(progress: &ProgressView) -> String {
    let phase = match progress.phase {
        Phase::Starting => "starting",
        Phase::Fetching => "fetching",
        Phase::Processing => "processing",
        Phase::Complete => "complete",
        Phase::Error => "error",
    };
    let mut line = format!(
        "[{:>3}%] {} {}/{}",
        progress.percent, phase, progress.current, progress.total
    );
    if let Some(url) = &progress.subject_url {
        line.push(' ');
        line.push_str(url);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use scrapeqa_core::AnswerView;

    #[test]
    fn first_render_shows_view_header() {
        let view = AppViewModel::default();
        assert_eq!(render_lines(None, &view), vec!["== Scrape ==".to_string()]);
    }

    #[test]
    fn unchanged_view_renders_nothing() {
        let view = AppViewModel::default();
        assert!(render_lines(Some(&view), &view).is_empty());
    }

    #[test]
    fn progress_and_answer_changes_are_printed() {
        let before = AppViewModel::default();
        let after = AppViewModel {
            progress: Some(ProgressView {
                phase: Phase::Fetching,
                percent: 33,
                current: 1,
                total: 3,
                subject_url: Some("https://a.example/".to_string()),
            }),
            answer: Some(AnswerView {
                text: "X is Y".to_string(),
                sources: vec!["https://a.example/".to_string()],
            }),
            ..AppViewModel::default()
        };

        assert_eq!(
            render_lines(Some(&before), &after),
            vec![
                "[ 33%] fetching 1/3 https://a.example/".to_string(),
                "Answer: X is Y".to_string(),
                "Sources:".to_string(),
                "  - https://a.example/".to_string(),
            ]
        );
    }

    #[test]
    fn manage_view_lists_urls() {
        let before = AppViewModel::default();
        let after = AppViewModel {
            view: View::Manage,
            scraped_urls: vec!["https://a.example/".to_string()],
            scraped_url_count: 1,
            ..AppViewModel::default()
        };
        assert_eq!(
            render_lines(Some(&before), &after),
            vec![
                "== Manage ==".to_string(),
                "Scraped URLs (1):".to_string(),
                "  https://a.example/".to_string(),
            ]
        );
    }

    #[test]
    fn completed_listing_is_printed_in_any_view() {
        let before = AppViewModel::default();
        let after = AppViewModel {
            view: View::Ask,
            scraped_urls: vec!["https://a.example/".to_string()],
            scraped_url_count: 1,
            listing_revision: 1,
            ..before.clone()
        };
        let lines = render_lines(Some(&before), &after);
        assert_eq!(
            lines,
            vec![
                "== Ask ==".to_string(),
                "Scraped URLs (1):".to_string(),
                "  https://a.example/".to_string(),
            ]
        );

        // Same list again, fetched by a second `urls`.
        let again = AppViewModel {
            listing_revision: 2,
            ..after.clone()
        };
        assert_eq!(
            render_lines(Some(&after), &again),
            vec![
                "Scraped URLs (1):".to_string(),
                "  https://a.example/".to_string(),
            ]
        );
    }

    #[test]
    fn notices_carry_time_and_level() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        assert_eq!(
            format_notice(at, &Notification::error("Failed to get answer")),
            "[09:30:05] !! Failed to get answer"
        );
    }
}
