use anyhow::Result;

use crate::error::Error;
use crate::provider::{Mod, ModCatalog};

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Mod names
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,
}

/// Show catalog details about specific mods
#[tracing::instrument(skip(catalog))]
pub async fn show<C: ModCatalog + ?Sized>(catalog: &C, args: &ShowArgs) -> Result<()> {
    for (i, name) in args.mods.iter().enumerate() {
        if i > 0 {
            println!("{}", "-".repeat(80));
        }
        match catalog.get_mod(name).await {
            Ok(m) => print!("{}", describe(&m)),
            Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => {
                println!("Error: Mod {} does not exist", name);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn describe(m: &Mod) -> String {
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(format!("Name: {}", m.name));
    line(format!("Author: {}", m.owner));
    line(format!("Title: {}", m.title));
    line(format!("Summary: {}", m.summary));
    if let Some(description) = &m.description {
        line("Description:".to_string());
        for text in description.lines() {
            line(format!("    {}", text));
        }
    }
    if !m.tags.is_empty() {
        line(format!("Tags: {}", m.tags.join(", ")));
    }
    if let Some(homepage) = m.homepage.as_deref().filter(|h| !h.is_empty()) {
        line(format!("Homepage: {}", homepage));
    }
    if let Some(path) = m.github_path.as_deref().filter(|p| !p.is_empty()) {
        line(format!("GitHub page: https://github.com/{}", path));
    }
    if let Some(license) = &m.license {
        line(format!("License: {}", license));
    }
    let game_versions: Vec<String> = m.game_versions().iter().map(|v| v.to_string()).collect();
    line(format!("Game versions: {}", game_versions.join(", ")));
    line("Releases:".to_string());
    if m.releases.is_empty() {
        line("    No releases".to_string());
    }
    for release in &m.releases {
        line(format!(
            "    Version: {:<9} Game version: {:<9}",
            release.version.to_string(),
            release.game_version.to_string()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockModCatalog;
    use crate::provider::test_support::{release, remote_mod};

    #[test]
    fn test_describe() {
        let mut m = remote_mod(
            "foo",
            vec![
                release("foo", "1.0.0", "0.16", &[]),
                release("foo", "1.1.0", "0.17", &[]),
            ],
        );
        m.tags = vec!["logistics".into()];
        m.github_path = Some("someone/foo".into());
        m.description = Some("line one\nline two".into());

        let text = describe(&m);
        assert!(text.contains("Name: foo\n"));
        assert!(text.contains("Tags: logistics\n"));
        assert!(text.contains("GitHub page: https://github.com/someone/foo\n"));
        assert!(text.contains("    line two\n"));
        assert!(text.contains("Game versions: 0.16, 0.17\n"));
        assert!(text.contains("    Version: 1.1.0     Game version: 0.17"));
        assert!(!text.contains("Homepage"));
    }

    #[tokio::test]
    async fn test_show_missing_mod_continues() {
        let mut catalog = MockModCatalog::new();
        catalog
            .expect_get_mod()
            .returning(|name| match name {
                "foo" => Ok(remote_mod("foo", vec![])),
                other => Err(Error::ModNotFound(other.to_string()).into()),
            });

        let args = ShowArgs {
            mods: vec!["missing".into(), "foo".into()],
        };
        show(&catalog, &args).await.unwrap();
    }
}
