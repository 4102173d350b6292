//! End-to-end: locate workflow scripts, parse them leniently, collect edits,
//! translate them into host coordinates and splice the host document.

use netup_edit::apply_edits;
use netup_rid::PortabilityGraph;
use netup_script::{collect_edits, locate_workflow_scripts, parse_lenient};
use netup_types::Channel;
use pretty_assertions::assert_eq;

fn rewrite_host(host: &str, target: Channel) -> String {
    let mut lines: Vec<String> = host.lines().map(str::to_string).collect();
    let mut host_edits = Vec::new();

    for doc in locate_workflow_scripts(host) {
        let tree = parse_lenient(&doc.text);
        for edit in collect_edits(&tree, target, PortabilityGraph::builtin()) {
            host_edits.push(doc.to_host_edit(&edit));
        }
    }

    apply_edits(&mut lines, &host_edits);
    lines.join("\n") + "\n"
}

#[test]
fn workflow_scripts_are_rewritten_in_place() {
    let host = "\
name: ci
jobs:
  build:
    steps:
      - name: Build
        run: dotnet build -f net6.0
      - name: Publish
        shell: bash
        run: |
          dotnet publish \\
            -r ubuntu.22.04-x64 \\
            -f net6.0
      - name: Not ours
        shell: pwsh
        run: dotnet build -f net6.0
";
    let expected = "\
name: ci
jobs:
  build:
    steps:
      - name: Build
        run: dotnet build -f net8.0
      - name: Publish
        shell: bash
        run: |
          dotnet publish \\
            -r linux-x64 \\
            -f net8.0
      - name: Not ours
        shell: pwsh
        run: dotnet build -f net6.0
";
    assert_eq!(rewrite_host(host, Channel::new(8, 0)), expected);
}

#[test]
fn templated_fragments_still_rewrite_their_literal_parts() {
    let host = "\
jobs:
  test:
    steps:
      - run: |
          dotnet test --framework net6.0 --filter ${{ matrix.filter }}
";
    let rewritten = rewrite_host(host, Channel::new(8, 0));
    assert!(rewritten.contains("--framework net8.0"));
    assert!(rewritten.contains("${{ matrix.filter }}"));
}

#[test]
fn unrelated_yaml_content_is_untouched() {
    let host = "\
jobs:
  build:
    container: whatever:net6.0
    steps:
      - uses: actions/setup-dotnet@v4
        with:
          dotnet-version: 6.0.x
      - run: echo done
";
    assert_eq!(rewrite_host(host, Channel::new(8, 0)), host);
}
