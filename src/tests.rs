/*!
 * Tests for flattree scanning, encoding and expanding
 */

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use clap::Parser;
use tempfile::tempdir;

use crate::config::{Args, Command, FlattenConfig, RuleSet, ScanMode};
use crate::materializer::materialize;
use crate::paths::to_slash;
use crate::reader::XmlReader;
use crate::rules::IGNORE_FILE_NAME;
use crate::scanner::{walk, Scanner, SkipReason, WalkControl};
use crate::types::{Document, Entry};
use crate::writer::XmlWriter;

// Helper to write a file with explicit permission bits
fn write_file(path: &Path, content: &[u8], mode: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content)?;
    fs::set_permissions(path, Permissions::from_mode(mode))
}

// Helper function to create a test directory structure
fn setup_test_directory() -> io::Result<tempfile::TempDir> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();

    write_file(&root.join("a.txt"), b"hello", 0o644)?;
    write_file(&root.join("run.sh"), b"#!/bin/sh\necho hi\n", 0o755)?;
    write_file(&root.join("src").join("lib.rs"), b"pub fn f() {}\n", 0o644)?;
    write_file(&root.join("src").join("nested").join("deep.rs"), b"// deep\n", 0o600)?;

    // Files to be ignored by default
    write_file(&root.join(".git").join("config"), b"[core]\n", 0o644)?;
    write_file(&root.join("node_modules").join("pkg").join("index.js"), b"x", 0o644)?;
    write_file(&root.join(".task").join("state"), b"todo", 0o644)?;

    // A binary file
    write_file(&root.join("image.bin"), &[0u8, 1, 2, 3, 0xff], 0o644)?;

    Ok(temp_dir)
}

fn rules(ignored: &[&str], allowed: &[&str]) -> RuleSet {
    RuleSet {
        ignored_globs: ignored.iter().map(|s| s.to_string()).collect(),
        allowed_globs: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

fn scan(config: FlattenConfig) -> Document {
    Scanner::new(config).unwrap().scan().unwrap()
}

#[test]
fn test_default_rules_scenario() -> io::Result<()> {
    let temp_dir = tempdir()?;
    write_file(&temp_dir.path().join("a.txt"), b"hello", 0o644)?;
    write_file(&temp_dir.path().join(".git").join("config"), b"anything", 0o644)?;

    let document = scan(FlattenConfig::for_root(temp_dir.path()));

    let mut expected = Document::new();
    expected.insert("a.txt", Entry::with_perm("0644", "hello"));
    assert_eq!(document, expected);

    Ok(())
}

#[test]
fn test_basic_scan() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;

    let document = scan(FlattenConfig::for_root(temp_dir.path()));

    let paths: Vec<&str> = document.paths().collect();
    assert_eq!(paths, vec!["a.txt", "run.sh", "src/lib.rs", "src/nested/deep.rs"]);

    assert_eq!(document.get("run.sh").unwrap().perm, "0755");
    assert_eq!(document.get("src/nested/deep.rs").unwrap().perm, "0600");
    assert_eq!(
        document.get("src/lib.rs").unwrap().content,
        b"pub fn f() {}\n".to_vec()
    );

    Ok(())
}

#[test]
fn test_ignored_directory_is_never_descended() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let root = temp_dir.path();
    let locked = root.join("node_modules").join("locked");
    write_file(&locked.join("secret.js"), b"nope", 0o000)?;
    fs::set_permissions(&locked, Permissions::from_mode(0o000))?;

    // Drive the walker the way the scanner does
    let mut visited = Vec::new();
    walk(root, |entry| {
        let key = to_slash(entry.path().strip_prefix(root).unwrap())?;
        visited.push(key.clone());
        if key == "node_modules" {
            Ok(WalkControl::SkipSubtree)
        } else {
            Ok(WalkControl::Continue)
        }
    })
    .unwrap();
    assert!(visited.contains(&"node_modules".to_string()));
    assert!(!visited.iter().any(|p| p.starts_with("node_modules/")));

    // The unreadable directory below the pruned one causes no error
    let (document, statistics) = Scanner::new(FlattenConfig::for_root(root))
        .unwrap()
        .scan_with_statistics()
        .unwrap();
    assert!(!document.paths().any(|p| p.starts_with("node_modules/")));
    assert!(statistics.pruned_dirs >= 3);

    fs::set_permissions(&locked, Permissions::from_mode(0o755))?;
    Ok(())
}

#[test]
fn test_exact_ignore_prunes_directory() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let mut config = FlattenConfig::for_root(temp_dir.path());
    config.rules = rules(&["src/nested"], &[]);

    let document = scan(config);

    assert!(document.contains("src/lib.rs"));
    assert!(!document.contains("src/nested/deep.rs"));
    // Ignore list was replaced, so .git is back in
    assert!(document.contains(".git/config"));

    Ok(())
}

#[test]
fn test_flatten_is_idempotent() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;

    let first = scan(FlattenConfig::for_root(temp_dir.path()));
    let second = scan(FlattenConfig::for_root(temp_dir.path()));
    assert_eq!(first, second);

    Ok(())
}

#[test]
fn test_binary_files() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;

    let skipping = scan(FlattenConfig::for_root(temp_dir.path()));
    assert!(!skipping.contains("image.bin"));

    let mut config = FlattenConfig::for_root(temp_dir.path());
    config.skip_binary_files = false;
    let keeping = scan(config);
    assert_eq!(
        keeping.get("image.bin").unwrap().content,
        vec![0u8, 1, 2, 3, 0xff]
    );

    Ok(())
}

#[test]
fn test_allow_list_does_not_cross_directories() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    write_file(&root.join("a.txt"), b"a", 0o644)?;
    write_file(&root.join("b.rs"), b"b", 0o644)?;
    write_file(&root.join("sub").join("readme.txt"), b"r", 0o644)?;

    let mut config = FlattenConfig::for_root(root);
    config.rules = rules(&[], &["*.txt"]);
    let (document, statistics) = Scanner::new(config).unwrap().scan_with_statistics().unwrap();

    assert_eq!(document.paths().collect::<Vec<_>>(), vec!["a.txt"]);
    assert_eq!(statistics.skipped(SkipReason::NotAllowed), 2);

    Ok(())
}

#[test]
fn test_include_only_patterns() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;

    let mut config = FlattenConfig::for_root(temp_dir.path());
    config.include_only = vec!["src/**".to_string()];
    let document = scan(config);

    assert_eq!(
        document.paths().collect::<Vec<_>>(),
        vec!["src/lib.rs", "src/nested/deep.rs"]
    );

    Ok(())
}

#[test]
fn test_symlinks_are_not_recorded() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let root = temp_dir.path();
    std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt"))?;
    std::os::unix::fs::symlink(root.join("src"), root.join("src-link"))?;

    let (document, statistics) = Scanner::new(FlattenConfig::for_root(root))
        .unwrap()
        .scan_with_statistics()
        .unwrap();

    assert!(!document.contains("link.txt"));
    assert!(!document.paths().any(|p| p.starts_with("src-link")));
    assert_eq!(statistics.skipped(SkipReason::Symlink), 2);

    Ok(())
}

#[test]
fn test_explicit_paths_inside_working_dir() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let cwd = temp_dir.path();

    let config = FlattenConfig::for_paths(
        cwd,
        vec!["a.txt".into(), cwd.join("src"), "./node_modules".into()],
    );
    let document = scan(config);

    assert_eq!(
        document.paths().collect::<Vec<_>>(),
        vec!["a.txt", "src/lib.rs", "src/nested/deep.rs"]
    );

    Ok(())
}

#[test]
fn test_explicit_path_outside_working_dir_keeps_absolute_key() -> io::Result<()> {
    let cwd = tempdir()?;
    let elsewhere = tempdir()?;
    let outside = elsewhere.path().join("notes.md");
    write_file(&outside, b"outside", 0o640)?;

    let document = scan(FlattenConfig::for_paths(cwd.path(), vec![outside.clone()]));

    let key = to_slash(&fs::canonicalize(&outside)?).unwrap();
    assert!(key.starts_with('/'));
    assert_eq!(document.paths().collect::<Vec<_>>(), vec![key.as_str()]);
    assert_eq!(document.get(&key).unwrap().perm, "0640");

    Ok(())
}

#[test]
fn test_no_ignores_keeps_binary_filtering() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let cwd = temp_dir.path();

    let mut config = FlattenConfig::for_paths(cwd, vec![cwd.to_path_buf()]);
    config.no_ignores = true;
    let document = scan(config);

    assert!(document.contains(".git/config"));
    assert!(document.contains("node_modules/pkg/index.js"));
    assert!(!document.contains("image.bin"));

    Ok(())
}

#[test]
fn test_from_args_applies_discovered_rules() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let root = temp_dir.path();
    write_file(&root.join(IGNORE_FILE_NAME), b"# project rules\ndist/\n", 0o644)?;
    let nested = root.join("src");
    fs::create_dir_all(&nested)?;

    let args = match Args::parse_from(["flattree", "flatten"]).command {
        Some(Command::Flatten(args)) => args,
        other => panic!("expected flatten, got {:?}", other),
    };
    let config = FlattenConfig::from_args(args, &nested).unwrap();

    assert_eq!(config.mode, ScanMode::Root(root.to_path_buf()));
    assert_eq!(config.rules.ignored_globs, vec!["dist/"]);
    assert!(config.rules.allowed_globs.is_empty());

    Ok(())
}

#[test]
fn test_outside_directory_is_filtered_relative_to_itself() -> io::Result<()> {
    let cwd = tempdir()?;
    let elsewhere = setup_test_directory()?;
    let base = to_slash(&fs::canonicalize(elsewhere.path())?).unwrap();

    let config = FlattenConfig::for_paths(cwd.path(), vec![elsewhere.path().to_path_buf()]);
    let (document, statistics) = Scanner::new(config).unwrap().scan_with_statistics().unwrap();

    let expected: Vec<String> = ["a.txt", "run.sh", "src/lib.rs", "src/nested/deep.rs"]
        .iter()
        .map(|rel| format!("{}/{}", base, rel))
        .collect();
    assert_eq!(document.paths().collect::<Vec<_>>(), expected);
    // .git/, .task/ and node_modules/ are pruned below the outside directory
    assert_eq!(statistics.pruned_dirs, 3);

    let mut config = FlattenConfig::for_paths(cwd.path(), vec![elsewhere.path().to_path_buf()]);
    config.include_only = vec!["src/**".to_string()];
    let document = scan(config);
    assert_eq!(
        document.paths().collect::<Vec<_>>(),
        vec![format!("{}/src/lib.rs", base), format!("{}/src/nested/deep.rs", base)]
    );

    Ok(())
}

#[test]
fn test_outside_file_is_filtered_by_name() -> io::Result<()> {
    let cwd = tempdir()?;
    let elsewhere = tempdir()?;
    write_file(&elsewhere.path().join("build.log"), b"log", 0o644)?;
    write_file(&elsewhere.path().join("notes.md"), b"notes", 0o644)?;

    let mut config = FlattenConfig::for_paths(
        cwd.path(),
        vec![elsewhere.path().join("build.log"), elsewhere.path().join("notes.md")],
    );
    config.rules = rules(&["*.log"], &[]);
    let document = scan(config);

    let key = to_slash(&fs::canonicalize(elsewhere.path().join("notes.md"))?).unwrap();
    assert_eq!(document.paths().collect::<Vec<_>>(), vec![key.as_str()]);

    Ok(())
}

#[test]
fn test_arguments_through_symlinked_directories() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let real = temp_dir.path().join("real");
    let link = temp_dir.path().join("link");
    write_file(&real.join("a.txt"), b"a", 0o644)?;
    write_file(&real.join("sub").join("b.txt"), b"b", 0o644)?;
    std::os::unix::fs::symlink(&real, &link)?;
    std::os::unix::fs::symlink(real.join("a.txt"), real.join("alias.txt"))?;

    // Arguments reached through the symlinked parent are under the working dir
    let document = scan(FlattenConfig::for_paths(
        &real,
        vec![link.join("a.txt"), link.join("sub"), "alias.txt".into()],
    ));
    assert_eq!(
        document.paths().collect::<Vec<_>>(),
        vec!["a.txt", "alias.txt", "sub/b.txt"]
    );
    // A symlink named directly is followed but keeps its own name
    assert_eq!(document.get("alias.txt").unwrap().content, b"a".to_vec());

    // Same when the working directory itself is reached through the link
    let document = scan(FlattenConfig::for_paths(&link, vec!["a.txt".into()]));
    assert_eq!(document.paths().collect::<Vec<_>>(), vec!["a.txt"]);

    Ok(())
}

#[test]
fn test_non_utf8_file_names_fail_the_scan() -> io::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = tempdir()?;
    write_file(&temp_dir.path().join(OsStr::from_bytes(b"x\xff.txt")), b"1", 0o644)?;
    write_file(&temp_dir.path().join(OsStr::from_bytes(b"x\xfe.txt")), b"2", 0o644)?;

    let result = Scanner::new(FlattenConfig::for_root(temp_dir.path()))
        .unwrap()
        .scan();
    assert!(matches!(result, Err(crate::error::FlatTreeError::Path(_))));

    Ok(())
}

#[test]
fn test_duplicate_keys_fail_the_scan() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let cwd = temp_dir.path();

    let result = Scanner::new(FlattenConfig::for_paths(cwd, vec!["a.txt".into(), ".".into()]))
        .unwrap()
        .scan();
    match result {
        Err(crate::error::FlatTreeError::Path(message)) => {
            assert!(message.contains("'a.txt'"), "{}", message)
        }
        other => panic!("expected a path error, got {:?}", other),
    }

    Ok(())
}

#[test]
fn test_round_trip() {
    let mut document = Document::new();
    document.insert("a.txt", Entry::with_perm("0644", "hello"));
    document.insert("empty.txt", Entry::with_perm("0600", ""));
    document.insert("crlf.txt", Entry::with_perm("0644", "one\r\ntwo\r\n"));
    document.insert("markup.html", Entry::with_perm("0644", "<a href=\"x\">&amp; 'q'</a>"));
    document.insert("spaces.txt", Entry::with_perm("0644", "  padded  \n\n\t"));
    document.insert("unicode.txt", Entry::with_perm("0644", "héllo ✓ 日本"));
    document.insert("nul.txt", Entry::with_perm("0644", "a\0b"));
    document.insert("bytes.bin", Entry::with_perm("0755", vec![0xff, 0xfe, 0x00, 0x41]));
    document.insert("dir with space/f&g.txt", Entry::with_perm("0644", "x"));
    document.insert("/abs/path.txt", Entry::with_perm("0644", "abs\n"));

    for presentation in [false, true] {
        let encoded = XmlWriter::new(presentation).encode(&document).unwrap();
        let decoded = XmlReader::new().decode(&encoded).unwrap();
        assert_eq!(decoded, document);
    }
}

#[test]
fn test_xml_structure() {
    let mut document = Document::new();
    document.insert("a.txt", Entry::with_perm("0644", "hello"));
    document.insert("empty", Entry::with_perm("0644", ""));
    document.insert("blob", Entry::with_perm("0644", vec![0u8, 0xff]));

    let xml = String::from_utf8(XmlWriter::new(false).encode(&document).unwrap()).unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<filetree generated="));
    assert!(xml.contains("<file path=\"a.txt\" perm=\"0644\">hello</file>"));
    assert!(xml.contains("<file path=\"empty\" perm=\"0644\"/>"));
    assert!(xml.contains("encoding=\"hex\">00ff</file>"));
    assert!(xml.trim_end().ends_with("</filetree>"));
}

#[test]
fn test_presentation_wrapping() {
    let mut document = Document::new();
    document.insert("a.txt", Entry::with_perm("0644", "```\nfenced\n```\n"));

    let wrapped = String::from_utf8(XmlWriter::new(true).encode(&document).unwrap()).unwrap();

    assert!(wrapped.starts_with("```xml\n<?xml"));
    assert!(wrapped.contains("</filetree>\n```\n"));
    assert!(wrapped.ends_with(crate::writer::PRESENTATION_TRAILER));
    assert_eq!(XmlReader::new().decode(wrapped.as_bytes()).unwrap(), document);
}

#[test]
fn test_decode_rejects_malformed_documents() {
    let reader = XmlReader::new();
    let cases: &[&str] = &[
        "",
        "not xml at all",
        "<filetree><file path=\"a\" perm=\"0644\">x</filetree>",
        "<filetree><file path=\"a\">x</file></filetree>",
        "<filetree><file perm=\"0644\">x</file></filetree>",
        "<filetree><dir path=\"a\" perm=\"0755\"/></filetree>",
        "<other/>",
        "<filetree><file path=\"a\" perm=\"0644\" encoding=\"hex\">zz</file></filetree>",
        "<filetree><file path=\"a\" perm=\"0644\" encoding=\"rot13\">x</file></filetree>",
        "<filetree><file path=\"a\" perm=\"0644\"/><file path=\"a\" perm=\"0644\"/></filetree>",
        "<filetree><file path=\"a\" perm=\"0644\"/>",
    ];

    for case in cases {
        let result = reader.decode(case.as_bytes());
        assert!(
            matches!(result, Err(crate::error::FlatTreeError::Parse(_))),
            "expected parse error for {:?}, got {:?}",
            case,
            result
        );
    }
}

#[test]
fn test_materialize_scenario() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let destination = temp_dir.path().join("out");

    let mut document = Document::new();
    document.insert("sub/dir/file.txt", Entry::with_perm("0755", "x"));

    let written = materialize(&document, &destination).unwrap();
    assert_eq!(written, 1);

    let target = destination.join("sub").join("dir").join("file.txt");
    assert_eq!(fs::read_to_string(&target)?, "x");
    let mode = fs::metadata(&target)?.permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    assert!(mode & 0o100 != 0);

    Ok(())
}

#[test]
fn test_materialize_stops_at_bad_permission() -> io::Result<()> {
    let temp_dir = tempdir()?;

    let mut document = Document::new();
    document.insert("a.txt", Entry::with_perm("0644", "first"));
    document.insert("b.txt", Entry::with_perm("rw-r--r--", "second"));
    document.insert("c.txt", Entry::with_perm("0644", "third"));

    let result = materialize(&document, temp_dir.path());
    assert!(matches!(result, Err(crate::error::FlatTreeError::Parse(_))));

    // Entries before the failing one stay on disk
    assert_eq!(fs::read_to_string(temp_dir.path().join("a.txt"))?, "first");
    assert!(!temp_dir.path().join("b.txt").exists());
    assert!(!temp_dir.path().join("c.txt").exists());

    Ok(())
}

#[test]
fn test_materialize_rejects_parent_components() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let destination = temp_dir.path().join("out");

    let mut document = Document::new();
    document.insert("../escape.txt", Entry::with_perm("0644", "x"));

    let result = materialize(&document, &destination);
    assert!(matches!(result, Err(crate::error::FlatTreeError::Path(_))));
    assert!(!temp_dir.path().join("escape.txt").exists());

    Ok(())
}

#[test]
fn test_flatten_then_expand() -> io::Result<()> {
    let source = setup_test_directory()?;
    let destination = tempdir()?;

    let flattened = scan(FlattenConfig::for_root(source.path()));
    let encoded = XmlWriter::new(false).encode(&flattened).unwrap();
    let decoded = XmlReader::new().decode(&encoded).unwrap();
    materialize(&decoded, destination.path()).unwrap();

    let restored = scan(FlattenConfig::for_root(destination.path()));
    assert_eq!(restored, flattened);

    Ok(())
}
