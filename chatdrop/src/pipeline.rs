//! `chatdrop import`: read a source, extract blocks, materialize them.

use tracing::{info, instrument};

use crate::core::extract::{Extraction, extract_with_grammar};
use crate::core::types::{PipelineOutcome, PlannedAction};
use crate::engine::{EngineOptions, MaterializationEngine, plan};
use crate::error::{DropError, DropResult};
use crate::io::source::InputSource;

/// Read `source` and run the full import.
#[instrument(skip_all, fields(source = %source.name()))]
pub fn import<S: InputSource + ?Sized>(
    source: &S,
    engine: &MaterializationEngine<'_>,
    options: &EngineOptions,
) -> DropResult<PipelineOutcome> {
    let text = source.read()?;
    import_text(&text, engine, options)
}

/// Run the import on text already in hand (the watch loop's entry point).
pub fn import_text(
    text: &str,
    engine: &MaterializationEngine<'_>,
    options: &EngineOptions,
) -> DropResult<PipelineOutcome> {
    let extraction = extract_nonempty(text)?;
    Ok(engine.process(&extraction.files, options))
}

/// Dry run: what an import of `text` would do under `options.root`.
pub fn preview(text: &str, options: &EngineOptions) -> DropResult<Vec<PlannedAction>> {
    let extraction = extract_nonempty(text)?;
    Ok(plan(&extraction.files, &options.root))
}

/// Extract blocks, mapping the two "nothing to do" cases to errors.
pub fn extract_nonempty(text: &str) -> DropResult<Extraction> {
    if text.trim().is_empty() {
        return Err(DropError::no_input("input is empty"));
    }
    let extraction = extract_with_grammar(text);
    let Some(grammar) = extraction.grammar else {
        return Err(DropError::NoBlocksFound);
    };
    info!(
        grammar = grammar.name(),
        files = extraction.files.len(),
        "extracted files"
    );
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Action, FileStatus};
    use crate::io::source::TextSource;
    use crate::io::validator::ValidatorRegistry;
    use std::fs;

    const HELLO: &str = "Here you go:\n\n--- a/hello.go ---\n```go\npackage main\n\nfunc main() {}\n```\n";

    #[test]
    fn empty_input_is_no_input() {
        let err = extract_nonempty("  \n\t").unwrap_err();
        assert!(matches!(err, DropError::NoInput { .. }));
    }

    #[test]
    fn prose_only_is_no_blocks() {
        let err = extract_nonempty("just some chat, no code").unwrap_err();
        assert!(matches!(err, DropError::NoBlocksFound));
    }

    #[test]
    fn import_writes_the_extracted_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = ValidatorRegistry::new();
        let engine = MaterializationEngine::new(&registry);
        let options = EngineOptions::for_root(temp.path());

        let outcome =
            import(&TextSource(HELLO.to_string()), &engine, &options).expect("import");

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].path, "a/hello.go");
        assert_eq!(outcome.files[0].status, FileStatus::Created);
        assert_eq!(outcome.stats.extensions.get("go"), Some(&1));
        assert_eq!(
            fs::read_to_string(temp.path().join("a/hello.go")).expect("read"),
            "package main\n\nfunc main() {}"
        );
    }

    #[test]
    fn preview_does_not_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = EngineOptions::for_root(temp.path());

        let actions = preview(HELLO, &options).expect("preview");

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, Action::Create);
        assert!(!temp.path().join("a").exists());
    }
}
