//! Rendering every page into the output directory.
//!
//! ```text
//! build_site()
//!     │
//!     ├── prepare_output()   clean or create the output directory
//!     │
//!     └── for each page in the page directory (sorted)
//!             render_page() ──► output/<Ns>/<Page>.txt
//! ```
//!
//! Every page is an independent parse: data discovered while rendering one
//! page is never visible to the next. A failing page is reported and the
//! build continues; the build fails at the end if any page failed.

use crate::{config::WikiConfig, engine::Engine, log, wiki::FsStore};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Extension of rendered files.
const OUTPUT_EXTENSION: &str = "txt";

/// Render all pages. Returns the number of pages written.
pub fn build_site(config: &WikiConfig) -> Result<usize> {
    let pages = FsStore::new(config.pages_dir(), config.wiki.extension.clone());
    let output = FsStore::new(config.output_dir(), OUTPUT_EXTENSION);
    prepare_output(output.root(), config.build.clean)?;

    let engine = Engine::from_config(config)?;
    let titles = pages.titles();
    log!("build"; "rendering {} pages", titles.len());

    let mut written = 0;
    let mut failed = 0;
    for title in &titles {
        let name = title.prefixed_text();
        let rendered = match engine.render_page(&name) {
            Ok(text) => text,
            Err(err) => {
                log!("error"; "{:#}", err);
                failed += 1;
                continue;
            }
        };

        let path = output.path_for(title);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }

    if failed > 0 {
        bail!("{failed} of {} pages failed to render", titles.len());
    }
    log!("build"; "wrote {} pages to {}", written, output.root().display());
    Ok(written)
}

fn prepare_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output).with_context(|| {
            format!("Failed to clear output directory: {}", output.display())
        })?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, text: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn config(dir: &TempDir) -> WikiConfig {
        WikiConfig {
            root: dir.path().to_path_buf(),
            ..WikiConfig::default()
        }
    }

    #[test]
    fn test_build_site_renders_all_pages() {
        let dir = TempDir::new().unwrap();
        let pages = dir.path().join("pages");
        write(&pages, "Sword.wiki", "{{#data:#Stats|atk=12}}");
        write(&pages, "Armory.wiki", "Sword: {{#using:Sword#Stats|Card}}");
        write(&pages, "Template/Card.wiki", "atk {{{atk}}}");

        let written = build_site(&config(&dir)).unwrap();
        assert_eq!(written, 3);

        let armory = fs::read_to_string(dir.path().join("public/Armory.txt")).unwrap();
        assert_eq!(armory, "Sword: atk 12");
        assert!(dir.path().join("public/Template/Card.txt").exists());
    }

    #[test]
    fn test_build_site_clean() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("pages"), "Home.wiki", "hi");
        write(&dir.path().join("public"), "stale.txt", "old");

        let mut config = config(&dir);
        build_site(&config).unwrap();
        assert!(dir.path().join("public/stale.txt").exists());

        config.build.clean = true;
        build_site(&config).unwrap();
        assert!(!dir.path().join("public/stale.txt").exists());
        assert!(dir.path().join("public/Home.txt").exists());
    }

    #[test]
    fn test_build_site_empty_wiki() {
        let dir = TempDir::new().unwrap();
        assert_eq!(build_site(&config(&dir)).unwrap(), 0);
        assert!(dir.path().join("public").is_dir());
    }
}
