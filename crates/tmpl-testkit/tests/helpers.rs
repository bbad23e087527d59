use std::time::Duration;

use tmpl_testkit::{rewrite_template, temp_dir_in_workspace, wait_until, write_template};

#[test]
fn test_temp_dir_is_under_dot_tmp() {
    let temp = temp_dir_in_workspace();
    let parent = temp.path().parent().unwrap();
    assert_eq!(parent.file_name().unwrap(), ".tmp");
}

#[test]
fn test_write_template_creates_parents() {
    let temp = temp_dir_in_workspace();
    let path = write_template(temp.path(), "layouts/base.html", "{{.Title}}");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{{.Title}}");
}

#[test]
fn test_rewrite_moves_mtime_forward() {
    let temp = temp_dir_in_workspace();
    let path = write_template(temp.path(), "page.html", "a");
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();

    rewrite_template(&path, "b");

    let after = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert!(after > before);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "b");
}

#[test]
fn test_wait_until() {
    let mut calls = 0;
    assert!(wait_until(Duration::from_secs(1), || {
        calls += 1;
        calls == 3
    }));
    assert!(!wait_until(Duration::from_millis(30), || false));
}
