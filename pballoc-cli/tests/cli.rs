use std::{fs, path::Path};

use assert_cmd::Command;
use tempfile::TempDir;

fn pballoc(medium: &Path, args: &[&str]) -> Command {
	let mut c = Command::cargo_bin("pballoc").unwrap();
	c.arg(medium).args(args);
	c
}

#[test]
fn round_trip_through_the_cli() {
	let dir = TempDir::new().unwrap();
	let medium = dir.path().join("t.pba");
	let input = dir.path().join("payload");
	fs::write(&input, b"persistent bytes").unwrap();

	pballoc(&medium, &["init", "--dynamic"]).assert().success();

	let out = pballoc(&medium, &["put", input.to_str().unwrap()])
		.assert()
		.success();
	let ptr: u64 = String::from_utf8_lossy(&out.get_output().stdout)
		.trim()
		.parse()
		.unwrap();

	let out = pballoc(&medium, &["ls"]).assert().success();
	let ls = String::from_utf8_lossy(&out.get_output().stdout).to_string();
	assert!(ls.contains(&ptr.to_string()));

	let out = pballoc(&medium, &["cat", &ptr.to_string()])
		.assert()
		.success();
	assert!(out.get_output().stdout.starts_with(b"persistent bytes"));

	pballoc(&medium, &["check"]).assert().success().stdout("OK\n");

	pballoc(&medium, &["rm", &ptr.to_string()]).assert().success();
	let out = pballoc(&medium, &["ls"]).assert().success();
	assert!(out.get_output().stdout.is_empty());
}

#[test]
fn init_refuses_a_small_static_medium() {
	let dir = TempDir::new().unwrap();
	let medium = dir.path().join("t.pba");

	pballoc(&medium, &["init"]).assert().failure();
	pballoc(&medium, &["init", "--size", "1024"]).assert().success();
	pballoc(&medium, &["check"]).assert().success();
}
