//! Remediation hints for compile outcomes

use std::collections::BTreeSet;

use crate::domain::{CompileOutcome, Hint, SourceUpload};

/// Hints for a compile outcome given the submitted files in submission order.
///
/// A `similar` outcome yields no hints.
pub fn hints_for(outcome: CompileOutcome, files: &[SourceUpload]) -> BTreeSet<Hint> {
    let mut hints = BTreeSet::new();

    if outcome.is_failure() {
        if !files.iter().any(|f| f.is_stdlib) {
            hints.insert(Hint::StdlibMissing);
        } else if !files.first().map(|f| f.is_stdlib).unwrap_or(false) {
            hints.insert(Hint::StdlibOrder);
        }

        if !files.iter().any(|f| f.is_entrypoint) {
            hints.insert(Hint::EntrypointMissing);
        }

        hints.insert(Hint::CompilerVersion);
        hints.insert(Hint::RequiredFiles);
        hints.insert(Hint::FileOrder);
    }

    if outcome == CompileOutcome::NotSimilar {
        hints.insert(Hint::NotSimilar);
    }

    if outcome != CompileOutcome::Similar {
        hints.insert(Hint::SupportGroup);
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_without_stdlib_or_entrypoint() {
        let files = vec![SourceUpload::new("a.fc", "")];
        let hints = hints_for(CompileOutcome::CompileError, &files);

        assert!(hints.contains(&Hint::StdlibMissing));
        assert!(hints.contains(&Hint::EntrypointMissing));
        assert!(hints.contains(&Hint::CompilerVersion));
        assert!(hints.contains(&Hint::RequiredFiles));
        assert!(hints.contains(&Hint::FileOrder));
        assert!(!hints.contains(&Hint::StdlibOrder));
        assert!(!hints.contains(&Hint::NotSimilar));
    }

    #[test]
    fn test_stdlib_not_first() {
        let files = vec![
            SourceUpload::new("main.fc", "").entrypoint(),
            SourceUpload::new("stdlib.fc", "").stdlib(),
        ];
        let hints = hints_for(CompileOutcome::UnknownError, &files);

        assert!(hints.contains(&Hint::StdlibOrder));
        assert!(!hints.contains(&Hint::StdlibMissing));
        assert!(!hints.contains(&Hint::EntrypointMissing));
    }

    #[test]
    fn test_not_similar_and_similar() {
        let files = vec![SourceUpload::new("main.fc", "").entrypoint()];

        let mismatch = hints_for(CompileOutcome::NotSimilar, &files);
        assert_eq!(
            mismatch.into_iter().collect::<Vec<_>>(),
            vec![Hint::NotSimilar, Hint::SupportGroup]
        );

        assert!(hints_for(CompileOutcome::Similar, &files).is_empty());
    }
}
