// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn substitutes_known_variables() {
    let rendered = render(
        "singularity run {{ image_file }} {{ command }}",
        &vars(&[("image_file", "worker.sif"), ("command", "bootstrap.sh")]),
    );
    assert_eq!(rendered, "singularity run worker.sif bootstrap.sh");
}

#[test]
fn whitespace_inside_braces_is_flexible() {
    let v = vars(&[("name", "dm-datamover_a1b2")]);
    assert_eq!(render("{{name}}", &v), "dm-datamover_a1b2");
    assert_eq!(render("{{  name  }}", &v), "dm-datamover_a1b2");
}

#[test]
fn unknown_variables_are_left_intact() {
    let rendered = render("run {{ missing }} now", &vars(&[]));
    assert_eq!(rendered, "run {{ missing }} now");
}

#[test]
fn repeated_placeholders_all_substitute() {
    let rendered = render(
        "{{ p }}/in {{ p }}/out",
        &vars(&[("p", "/deploy/worker")]),
    );
    assert_eq!(rendered, "/deploy/worker/in /deploy/worker/out");
}
