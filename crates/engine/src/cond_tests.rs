// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn data() -> Value {
    serde_json::json!({
        "result": {
            "approved": true,
            "rejected": false,
            "status": "ready",
            "score": 0.85,
            "count": 3,
            "empty": "",
            "items": [1, 2],
            "nested": {"deep": {"flag": true}},
        }
    })
}

#[parameterized(
    truthy_bool = { "{{ result.approved }}", true },
    falsy_bool = { "{{ result.rejected }}", false },
    truthy_string = { "{{ result.status }}", true },
    empty_string = { "{{ result.empty }}", false },
    truthy_number = { "{{ result.count }}", true },
    truthy_array = { "{{ result.items }}", true },
    deep_path = { "{{ result.nested.deep.flag }}", true },
    unknown_path = { "{{ result.ghost }}", false },
    unknown_root = { "{{ missing.path }}", false },
)]
fn truthiness(expr: &str, expected: bool) {
    assert_eq!(evaluate(expr, &data()), expected);
}

#[parameterized(
    string_eq = { "{{ result.status == 'ready' }}", true },
    string_eq_double_quotes = { "{{ result.status == \"ready\" }}", true },
    string_ne = { "{{ result.status != 'done' }}", true },
    bool_eq_true = { "{{ result.approved == true }}", true },
    bool_eq_yes = { "{{ result.approved == 'yes' }}", true },
    bool_ne = { "{{ result.rejected != true }}", true },
    num_gt = { "{{ result.score > 0.8 }}", true },
    num_gt_false = { "{{ result.score > 0.9 }}", false },
    num_ge = { "{{ result.count >= 3 }}", true },
    num_le = { "{{ result.count <= 2 }}", false },
    num_eq = { "{{ result.count == 3 }}", true },
    num_vs_garbage = { "{{ result.count == 'three' }}", false },
    null_comparison = { "{{ result.ghost == 'x' }}", false },
    null_ordering = { "{{ result.ghost > 1 }}", false },
)]
fn comparisons(expr: &str, expected: bool) {
    assert_eq!(evaluate(expr, &data()), expected);
}

#[parameterized(
    no_braces = { "result.approved" },
    empty = { "{{ }}" },
    half_open = { "{{ result.approved" },
)]
fn malformed_is_false(expr: &str) {
    assert!(!evaluate(expr, &data()));
}

#[test]
fn simple_next_name() {
    let next = NextSpec::Name("publish".to_string());
    assert_eq!(select_next_target(&next, &data()), Some("publish".to_string()));
}

#[test]
fn conditional_next_first_match_wins() {
    let next: NextSpec = serde_yaml::from_str(
        "- if: \"{{ result.rejected }}\"\n  goto: revise\n- if: \"{{ result.approved }}\"\n  goto: publish\n",
    )
    .unwrap();
    assert_eq!(select_next_target(&next, &data()), Some("publish".to_string()));
}

#[test]
fn else_flag_uses_goto() {
    let next: NextSpec = serde_yaml::from_str(
        "- if: \"{{ result.rejected }}\"\n  goto: publish\n- else: true\n  goto: revise\n",
    )
    .unwrap();
    assert_eq!(select_next_target(&next, &data()), Some("revise".to_string()));
}

#[test]
fn else_target_shorthand() {
    let next: NextSpec = serde_yaml::from_str(
        "- if: \"{{ result.rejected }}\"\n  goto: publish\n- else: revise\n",
    )
    .unwrap();
    assert_eq!(select_next_target(&next, &data()), Some("revise".to_string()));
}

#[test]
fn no_match_yields_none() {
    let next: NextSpec =
        serde_yaml::from_str("- if: \"{{ result.rejected }}\"\n  goto: revise\n").unwrap();
    assert_eq!(select_next_target(&next, &data()), None);
}

#[test]
fn empty_condition_list_yields_none() {
    let next = NextSpec::Conditions(vec![]);
    assert_eq!(select_next_target(&next, &data()), None);
}
