use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::path::Path;

use crate::state::AppContext;

/// Log in once from the command line; the accepted cookies are persisted
/// exactly as the HTTP login does.
pub async fn login_once(ctx: &AppContext, cookies: &str) -> Result<()> {
    let user = ctx
        .session
        .login(cookies)
        .await
        .context("portal did not accept the cookies")?;

    println!("✅ Login succeeded");
    println!("   Name:       {}", user.name.as_deref().unwrap_or("-"));
    println!("   Student ID: {}", user.student_id.as_deref().unwrap_or("-"));
    println!("   School:     {}", user.school.as_deref().unwrap_or("-"));
    println!(
        "   Saved to:   {}",
        ctx.session.session_file().display()
    );
    Ok(())
}

/// Last `limit` lines of the log file, oldest first
pub async fn tail_log(path: &Path, limit: usize) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut tail = VecDeque::with_capacity(limit);
    for line in text.lines() {
        if limit == 0 {
            break;
        }
        if tail.len() == limit {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
    Ok(tail.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::portal::testing::StubPortal;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_tail_log_keeps_newest_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.log");
        tokio::fs::write(&path, "one\ntwo\nthree\nfour\n").await.unwrap();

        assert_eq!(tail_log(&path, 2).await.unwrap(), vec!["three", "four"]);
        assert_eq!(tail_log(&path, 10).await.unwrap().len(), 4);
        assert!(tail_log(&path, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tail_log_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio_test::assert_err!(tail_log(&dir.path().join("absent.log"), 5).await);
    }

    #[tokio::test]
    async fn test_login_once_persists_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            session_config_path: dir.path().join("config.json"),
            ..ServerConfig::default()
        };
        let ctx = AppContext::new(config, Arc::new(StubPortal::accepting("sid=abc")));

        tokio_test::assert_ok!(login_once(&ctx, "sid=abc").await);
        assert!(dir.path().join("config.json").exists());

        tokio_test::assert_err!(login_once(&ctx, "sid=wrong").await);
    }
}
