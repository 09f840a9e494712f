use adlsfs::{ErrorKind, FileSelector, FileSystem, FileType, OperationKind};
use anyhow::Result;
use std::time::Duration;

mod common;
use common::{FILESYSTEM, build_tree, fixture, list, read_file, write_file};

#[test]
fn test_resolution_is_idempotent_through_handlers() -> Result<()> {
    let f = fixture();
    write_file(&f.account, "testfs/dir/file.bin", b"x")?;

    for raw in ["testfs/dir/file.bin", "/testfs/dir/file.bin/", "//testfs//dir/file.bin"] {
        let first = f.account.get_file_info(raw);
        // Empty segments are rejected rather than collapsed
        if raw.contains("//testfs//") {
            assert_eq!(first.unwrap_err().kind(), ErrorKind::InvalidPath);
            continue;
        }
        let first = first?;
        let second = f.account.get_file_info(&first.path)?;
        assert_eq!(first, second);
        assert_eq!(first.path, "testfs/dir/file.bin");
    }
    Ok(())
}

#[test]
fn test_missing_path_is_not_found_value() -> Result<()> {
    let f = fixture();
    let info = f.account.get_file_info("testfs/never/created")?;
    assert_eq!(info.file_type, FileType::NotFound);
    assert_eq!(info.path, "testfs/never/created");

    let info = f.account.get_file_info("nosuchfs")?;
    assert_eq!(info.file_type, FileType::NotFound);

    let info = f.bound.get_file_info("never")?;
    assert_eq!(info.file_type, FileType::NotFound);
    Ok(())
}

#[test]
fn test_write_read_round_trip() -> Result<()> {
    let f = fixture();
    for (fs, p) in [
        (&f.account as &dyn FileSystem, "testfs/p"),
        (&f.bound as &dyn FileSystem, "q"),
    ] {
        let mut out = fs.open_output_stream(p, &[])?;
        out.write(b"data")?;
        out.close()?;

        let info = fs.get_file_info(p)?;
        assert_eq!(info.file_type, FileType::File);
        assert_eq!(info.size, Some(4));

        let mut input = fs.open_input_stream(p)?;
        assert_eq!(&input.read(1024)?[..], b"data");
        assert!(input.read(1024)?.is_empty());
    }
    Ok(())
}

#[test]
fn test_delete_dir_requires_recursive_for_contents() -> Result<()> {
    let f = fixture();
    build_tree(&f.bound, "p")?;

    let err = f.bound.delete_dir("p", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.path(), Some("p"));

    f.bound.delete_dir("p", true)?;
    // A recursive delete removes `p` itself, so listing it afterwards is
    // only empty (rather than NotFound) with allow_not_found
    let selector = FileSelector::new("p").recursive(true).allow_not_found(true);
    assert_eq!(f.bound.get_file_info_selector(&selector)?.count(), 0);
    assert_eq!(f.bound.get_file_info("p/a/f1")?.file_type, FileType::NotFound);
    Ok(())
}

#[test]
fn test_recursive_selector_counts_each_entry_once() -> Result<()> {
    for page_size in [1, 2, 3, 1000] {
        let f = common::fixture_with(Default::default(), Some(page_size));
        let (leaves, dirs) = build_tree(&f.account, "testfs/root")?;

        let paths = list(&f.account, "testfs/root", true)?;
        assert_eq!(paths.len(), leaves + dirs, "page size {page_size}");

        let mut unique = paths.clone();
        unique.dedup();
        assert_eq!(unique.len(), paths.len(), "page size {page_size}");
    }
    Ok(())
}

#[test]
fn test_move_preserves_size() -> Result<()> {
    let f = fixture();
    write_file(&f.bound, "src.bin", &[7u8; 300])?;
    let before = f.bound.get_file_info("src.bin")?.size;

    let err = f.bound.move_path("src.bin", "moved/dst.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.path(), Some("moved"));
    f.bound.create_dir("moved", false)?;
    f.bound.move_path("src.bin", "moved/dst.bin")?;

    assert_eq!(f.bound.get_file_info("src.bin")?.file_type, FileType::NotFound);
    assert_eq!(f.bound.get_file_info("moved/dst.bin")?.size, before);
    assert_eq!(read_file(&f.bound, "moved/dst.bin")?, vec![7u8; 300]);
    Ok(())
}

#[test]
fn test_timeout_mutation_applies_to_next_call() -> Result<()> {
    let f = fixture();
    write_file(&f.bound, "t", b"1")?;

    f.bound.timeouts().set(OperationKind::Metadata, Some(3.0));
    _ = f.bound.get_file_info("t")?;
    assert_eq!(
        f.backend.last_timeout("get_properties"),
        Some(Some(Duration::from_secs(3)))
    );

    f.bound.timeouts().set(OperationKind::Metadata, Some(0.25));
    _ = f.bound.get_file_info("t")?;
    assert_eq!(
        f.backend.last_timeout("get_properties"),
        Some(Some(Duration::from_millis(250)))
    );

    // The account handler in the fixture shares the same cells
    _ = f.account.get_file_info(&format!("{FILESYSTEM}/t"))?;
    assert_eq!(
        f.backend.last_timeout("get_properties"),
        Some(Some(Duration::from_millis(250)))
    );
    Ok(())
}
