use scrapeqa_core::{LogicalType, Msg, View};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  scrape [--enhanced] <url>...   scrape one or more URLs
  ask <question>                 ask about the scraped content
  urls                           list scraped URLs
  remove <url>                   remove a scraped URL
  view scrape|ask|manage         switch view
  cancel                         cancel everything in flight
  cancel scrape|ask|urls         cancel one pending request
  cancel remove <url>            cancel a pending removal
  help                           show this text
  quit                           exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dispatch(Msg),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "scrape" => Command::Dispatch(parse_scrape(rest)),
        "ask" => Command::Dispatch(Msg::QuestionSubmitted(rest.to_string())),
        "urls" | "list" => Command::Dispatch(Msg::RefreshUrlsRequested),
        "remove" | "rm" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("remove <url>"));
            }
            Command::Dispatch(Msg::RemoveUrlClicked(rest.to_string()))
        }
        "view" => Command::Dispatch(Msg::ViewSelected(parse_view(rest)?)),
        "cancel" => Command::Dispatch(parse_cancel(rest)?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

// URLs may be separated by whitespace or commas; the controller rejects an
// empty list.
fn parse_scrape(rest: &str) -> Msg {
    let mut use_enhanced_rendering = false;
    let mut urls = Vec::new();
    for token in rest.split(|c: char| c.is_whitespace() || c == ',') {
        match token {
            "" => {}
            "--enhanced" | "-e" => use_enhanced_rendering = true,
            url => urls.push(url.to_string()),
        }
    }
    Msg::ScrapeSubmitted {
        urls,
        use_enhanced_rendering,
    }
}

fn parse_cancel(rest: &str) -> Result<Msg, CommandError> {
    const USAGE: &str = "cancel [scrape|ask|urls|remove <url>]";
    let (kind, url) = match rest.split_once(char::is_whitespace) {
        Some((kind, url)) => (kind, url.trim()),
        None => (rest, ""),
    };
    let logical_type = match (kind.to_ascii_lowercase().as_str(), url) {
        ("", _) => return Ok(Msg::CancelAllRequested),
        ("scrape", "") => LogicalType::Scrape,
        ("ask", "") => LogicalType::Ask,
        ("urls", "") => LogicalType::LoadUrls,
        ("remove", url) if !url.is_empty() => LogicalType::remove_url(url),
        _ => return Err(CommandError::Usage(USAGE)),
    };
    Ok(Msg::CancelRequested(logical_type))
}

fn parse_view(rest: &str) -> Result<View, CommandError> {
    match rest.to_ascii_lowercase().as_str() {
        "scrape" => Ok(View::Scrape),
        "ask" => Ok(View::Ask),
        "manage" => Ok(View::Manage),
        _ => Err(CommandError::Usage("view scrape|ask|manage")),
    }
}
