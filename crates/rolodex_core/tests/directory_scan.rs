use rolodex_core::repo::scanner::scan_directory;
use rolodex_core::RepoError;
use std::fs;
use std::path::Path;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn scan_loads_contacts_and_skips_everything_else() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20240102T000000--bea__contact.md",
        "---\ntitle: Bea\ntags: [contact]\nidentifier: 20240102T000000\nindex_id: 2\n---\n",
    );
    write(
        dir.path(),
        "20240101T000000--al__contact.md",
        "---\ntitle: Al\ntags: [contact]\nidentifier: 20240101T000000\nindex_id: 1\n---\n",
    );
    // Not contact filenames.
    write(dir.path(), "20240103T000000--plan__task.md", "---\ntags: [contact]\n---\n");
    write(dir.path(), "README.md", "hello");
    // Contact filenames with bad content.
    write(dir.path(), "20240104T000000--broken__contact.md", "no header here");
    write(
        dir.path(),
        "20240105T000000--shopping__contact.md",
        "---\ntitle: Shopping\ntags: [list]\n---\n",
    );

    let contacts = scan_directory(dir.path()).unwrap();
    let titles: Vec<&str> = contacts.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Al", "Bea"]);
    assert!(contacts
        .iter()
        .all(|contact| contact.path.starts_with(dir.path())));
}

#[test]
fn scan_descends_into_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("people").join("work");
    fs::create_dir_all(&nested).unwrap();
    write(
        &nested,
        "20240101T000000--deep__contact.md",
        "---\ntitle: Deep\ntags: [contact]\nidentifier: 20240101T000000\n---\n",
    );

    let contacts = scan_directory(dir.path()).unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].title, "Deep");
}

#[test]
fn missing_identifier_is_taken_from_filename() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20231111T111111--anon__contact.md",
        "---\ntitle: Anon\ntags: [contact]\n---\n",
    );

    let contacts = scan_directory(dir.path()).unwrap();
    assert_eq!(contacts[0].identifier, "20231111T111111");
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = scan_directory(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, RepoError::Directory { .. }));

    let file = dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();
    assert!(matches!(
        scan_directory(&file).unwrap_err(),
        RepoError::Directory { .. }
    ));
}

#[test]
fn empty_directory_yields_no_contacts() {
    let dir = tempfile::tempdir().unwrap();
    assert!(scan_directory(dir.path()).unwrap().is_empty());
}

#[test]
fn undecodable_records_are_skipped_but_others_still_load() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20240101T000000--kept__contact.md",
        "---\ntitle: Kept\ntags: [contact]\nidentifier: 20240101T000000\n---\n",
    );
    fs::write(
        dir.path().join("20240102T000000--latin__contact.md"),
        b"---\ntitle: Jos\xe9\ntags: [contact]\n---\n",
    )
    .unwrap();

    let contacts = scan_directory(dir.path()).unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].title, "Kept");
}

#[cfg(unix)]
#[test]
fn unreadable_record_fails_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "20240101T000000--kept__contact.md",
        "---\ntitle: Kept\ntags: [contact]\nidentifier: 20240101T000000\n---\n",
    );
    let dangling = dir.path().join("20240102T000000--gone__contact.md");
    std::os::unix::fs::symlink(dir.path().join("missing.md"), &dangling).unwrap();

    let err = scan_directory(dir.path()).unwrap_err();
    match err {
        RepoError::Io { path, source } => {
            assert_eq!(path, dangling);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn symlinked_record_is_read_through_the_link() {
    let dir = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("linked.md");
    fs::write(
        &target,
        "---\ntitle: Linked\ntags: [contact]\nidentifier: 20240103T000000\n---\n",
    )
    .unwrap();
    std::os::unix::fs::symlink(&target, dir.path().join("20240103T000000--linked__contact.md"))
        .unwrap();

    let contacts = scan_directory(dir.path()).unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].title, "Linked");
}
