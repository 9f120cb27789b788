//! Opening the user's web browser for interactive logins.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Opens a URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        let (program, args) = opener_command(url, std::env::var("BROWSER").ok())?;
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// Programs tried in order, honouring `$BROWSER` first.
fn candidates(browser_env: Option<String>) -> Vec<String> {
    let mut names: Vec<String> = browser_env
        .into_iter()
        .flat_map(|value| {
            value
                .split(':')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .collect();

    let defaults: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else {
        &["xdg-open", "gio", "sensible-browser", "firefox", "chromium"]
    };
    names.extend(defaults.iter().map(|s| s.to_string()));
    names
}

fn opener_command(url: &str, browser_env: Option<String>) -> io::Result<(PathBuf, Vec<String>)> {
    if cfg!(target_os = "windows") {
        // `start` would split the URL on `&`
        return Ok((
            PathBuf::from("rundll32"),
            vec!["url.dll,FileProtocolHandler".to_string(), url.to_string()],
        ));
    }

    for name in candidates(browser_env) {
        if let Ok(path) = which::which(&name) {
            let args = if name == "gio" {
                vec!["open".to_string(), url.to_string()]
            } else {
                vec![url.to_string()]
            };
            return Ok((path, args));
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "no browser launcher found (set $BROWSER)",
    ))
}
