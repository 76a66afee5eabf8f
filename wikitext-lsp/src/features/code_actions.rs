//! Code actions: quick fixes carried by lint diagnostics, whole-document "fix all" actions
//! and escaping a selection with magic words.

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, NumberOrString, Range,
    TextEdit, WorkspaceEdit,
};
use wikitext_parser::SyntaxTree;

use crate::document::TextDocument;
use crate::features::diagnostics::{quick_fixes, LINT_SOURCE};
use crate::position::{document_range, offset_at};

pub const ESCAPE_TITLE: &str = "Escape with magic words";

fn wants(only: Option<&[CodeActionKind]>, kind: &CodeActionKind) -> bool {
    let Some(only) = only else {
        return true;
    };
    only.iter().any(|wanted| {
        let wanted = wanted.as_str();
        kind.as_str() == wanted
            || kind
                .as_str()
                .strip_prefix(wanted)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn edit(document: &TextDocument, edits: Vec<TextEdit>) -> WorkspaceEdit {
    WorkspaceEdit {
        changes: Some(HashMap::from([(document.uri().clone(), edits)])),
        document_changes: None,
        change_annotations: None,
    }
}

fn rule_of(diagnostic: &Diagnostic) -> Option<&str> {
    if diagnostic.source.as_deref() != Some(LINT_SOURCE) {
        return None;
    }
    match &diagnostic.code {
        Some(NumberOrString::String(rule)) => Some(rule),
        _ => None,
    }
}

pub fn compute_code_actions(
    document: &TextDocument,
    tree: &SyntaxTree,
    range: Range,
    diagnostics: &[Diagnostic],
    only: Option<&[CodeActionKind]>,
) -> Vec<CodeActionOrCommand> {
    let mut actions = Vec::new();
    if wants(only, &CodeActionKind::QUICKFIX) {
        for diagnostic in diagnostics {
            for fix in quick_fixes(diagnostic) {
                actions.push(CodeAction {
                    title: fix.title,
                    kind: Some(CodeActionKind::QUICKFIX),
                    diagnostics: Some(vec![diagnostic.clone()]),
                    edit: Some(edit(
                        document,
                        vec![TextEdit {
                            range: fix.range,
                            new_text: fix.new_text,
                        }],
                    )),
                    command: None,
                    is_preferred: Some(fix.fix),
                    disabled: None,
                    data: None,
                });
            }
        }
    }

    let fix_all_kind = if wants(only, &CodeActionKind::QUICKFIX) {
        Some(CodeActionKind::QUICKFIX)
    } else if wants(only, &CodeActionKind::SOURCE_FIX_ALL) {
        Some(CodeActionKind::SOURCE_FIX_ALL)
    } else {
        None
    };
    if let Some(kind) = fix_all_kind {
        actions.extend(fix_all(document, tree, diagnostics, kind));
    }

    if wants(only, &CodeActionKind::REFACTOR_REWRITE) {
        actions.extend(escape(document, range));
    }
    actions.into_iter().map(CodeActionOrCommand::CodeAction).collect()
}

/// One action per rule with automatic fixes among `diagnostics`, then one for all rules.
fn fix_all(
    document: &TextDocument,
    tree: &SyntaxTree,
    diagnostics: &[Diagnostic],
    kind: CodeActionKind,
) -> Vec<CodeAction> {
    let fixable: Vec<(&str, &Diagnostic)> = diagnostics
        .iter()
        .filter(|diagnostic| quick_fixes(diagnostic).iter().any(|fix| fix.fix))
        .filter_map(|diagnostic| Some((rule_of(diagnostic)?, diagnostic)))
        .collect();
    if fixable.is_empty() {
        return Vec::new();
    }
    let mut rules: Vec<&str> = Vec::new();
    for (rule, _) in &fixable {
        if !rules.contains(rule) {
            rules.push(rule);
        }
    }
    let action = |title: String, rule: Option<&str>| {
        let covered = fixable
            .iter()
            .filter(|(r, _)| rule.map_or(true, |rule| rule == *r))
            .map(|(_, diagnostic)| (*diagnostic).clone())
            .collect();
        CodeAction {
            title,
            kind: Some(kind.clone()),
            diagnostics: Some(covered),
            edit: Some(edit(
                document,
                vec![TextEdit {
                    range: document_range(document),
                    new_text: apply_fixes(tree, rule),
                }],
            )),
            command: None,
            is_preferred: Some(true),
            disabled: None,
            data: None,
        }
    };
    let mut actions: Vec<CodeAction> = rules
        .iter()
        .map(|rule| action(format!("Fix all: {rule}"), Some(rule)))
        .collect();
    actions.push(action(format!("Fix all: {LINT_SOURCE}"), None));
    actions
}

/// Document text with every automatic fix applied. A fix overlapping an earlier one is
/// skipped.
pub fn apply_fixes(tree: &SyntaxTree, rule: Option<&str>) -> String {
    let text = tree.text();
    let mut fixes: Vec<_> = tree
        .lint()
        .into_iter()
        .filter(|error| rule.map_or(true, |rule| rule == error.rule))
        .filter_map(|error| error.fix)
        .collect();
    fixes.sort_by_key(|fix| fix.range);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for fix in fixes {
        let (start, end) = fix.range;
        if start < cursor || end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(&fix.text);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// `||`, `|` and `=` replaced by `{{!!}}`, `{{!}}` and `{{=}}`.
pub fn escape_with_magic_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '|' if chars.peek() == Some(&'|') => {
                chars.next();
                out.push_str("{{!!}}");
            }
            '|' => out.push_str("{{!}}"),
            '=' => out.push_str("{{=}}"),
            c => out.push(c),
        }
    }
    out
}

fn escape(document: &TextDocument, range: Range) -> Option<CodeAction> {
    let start = offset_at(document, range.start);
    let end = offset_at(document, range.end);
    if start >= end {
        return None;
    }
    let selected = &document.text()[start..end];
    let escaped = escape_with_magic_words(selected);
    if escaped == selected {
        return None;
    }
    Some(CodeAction {
        title: ESCAPE_TITLE.to_string(),
        kind: Some(CodeActionKind::REFACTOR_REWRITE),
        diagnostics: None,
        edit: Some(edit(
            document,
            vec![TextEdit {
                range,
                new_text: escaped,
            }],
        )),
        command: None,
        is_preferred: None,
        disabled: None,
        data: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::diagnostics::collect_diagnostics;
    use crate::features::test_support::{parsed, range};

    const TEXT: &str = "\nhttp://a]\n</br>\n[\n";

    fn actions(only: Option<&[CodeActionKind]>, selection: Range) -> Vec<CodeAction> {
        let (document, tree) = parsed(TEXT);
        let diagnostics = collect_diagnostics(&document, &tree, true);
        compute_code_actions(&document, &tree, selection, &diagnostics, only)
            .into_iter()
            .map(|action| match action {
                CodeActionOrCommand::CodeAction(action) => action,
                CodeActionOrCommand::Command(_) => panic!("expected code actions only"),
            })
            .collect()
    }

    fn only_edit(action: &CodeAction) -> TextEdit {
        let changes = action.edit.as_ref().unwrap().changes.as_ref().unwrap();
        assert_eq!(changes.len(), 1);
        let edits = changes.values().next().unwrap();
        assert_eq!(edits.len(), 1);
        edits[0].clone()
    }

    #[test]
    fn quick_fixes_then_fix_all() {
        let found = actions(Some(&[CodeActionKind::QUICKFIX]), range(0, 0, 1, 0));
        let titles: Vec<_> = found
            .iter()
            .map(|a| (a.title.as_str(), a.is_preferred))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("Suggestion: left bracket", Some(false)),
                ("Fix: open", Some(true)),
                ("Fix all: unmatched-tag", Some(true)),
                ("Fix all: WikiLint", Some(true)),
            ]
        );
        assert!(found
            .iter()
            .all(|a| a.kind == Some(CodeActionKind::QUICKFIX)));
        assert_eq!(
            only_edit(&found[0]),
            TextEdit {
                range: range(1, 0, 1, 0),
                new_text: "[".to_string()
            }
        );
        assert_eq!(found[2].diagnostics.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn source_fix_all_rewrites_the_document() {
        let found = actions(Some(&[CodeActionKind::SOURCE_FIX_ALL]), range(0, 0, 1, 0));
        assert_eq!(found.len(), 2);
        for action in &found {
            assert_eq!(action.kind, Some(CodeActionKind::SOURCE_FIX_ALL));
            assert_eq!(
                only_edit(action),
                TextEdit {
                    range: range(0, 0, 4, 0),
                    new_text: "\nhttp://a]\n<br>\n[\n".to_string()
                }
            );
        }
    }

    #[test]
    fn escapes_a_selection() {
        let text = "\n[//example.com/?query=1]\n{|\n|-\n| a || b\n|}\n";
        let (document, tree) = parsed(text);
        let escape_in = |selection: Range| {
            let found = compute_code_actions(
                &document,
                &tree,
                selection,
                &[],
                Some(&[CodeActionKind::REFACTOR]),
            );
            match found.as_slice() {
                [CodeActionOrCommand::CodeAction(action)] => {
                    assert_eq!(action.title, ESCAPE_TITLE);
                    assert_eq!(action.kind, Some(CodeActionKind::REFACTOR_REWRITE));
                    only_edit(action)
                }
                other => panic!("expected a single action, got {other:?}"),
            }
        };
        assert_eq!(
            escape_in(range(1, 0, 1, 24)),
            TextEdit {
                range: range(1, 0, 1, 24),
                new_text: "[//example.com/?query{{=}}1]".to_string()
            }
        );
        assert_eq!(
            escape_in(range(2, 0, 5, 2)).new_text,
            "{{{!}}\n{{!}}-\n{{!}} a {{!!}} b\n{{!}}}"
        );
    }

    #[test]
    fn empty_selection_has_no_rewrite() {
        assert!(actions(Some(&[CodeActionKind::REFACTOR]), range(1, 2, 1, 2)).is_empty());
    }
}
