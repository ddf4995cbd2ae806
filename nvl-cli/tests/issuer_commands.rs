//! Integration tests for the issuer commands.
//!
//! These tests run the `nvl` binary against a temporary home directory and
//! verify that issuer profiles are added, listed, made default and removed,
//! and that failures exit non-zero with a readable message.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Run `nvl` with the given home directory and no terminal input.
fn nvl(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nvl"))
        .arg("--home")
        .arg(home)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

/// Run `nvl` with the given home directory, answering prompts from `input`.
fn nvl_with_input(home: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_nvl"))
        .arg("--home")
        .arg(home)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Add an issuer without touching the network or the terminal.
fn add_issuer(home: &Path, name: &str, id: &str) -> Output {
    nvl(
        home,
        &[
            "issuer",
            "add",
            "http://127.0.0.1:9",
            "--force",
            "--client-id",
            "client-1",
            "--client-secret",
            "very-secret",
            "--redirect-uri",
            "http://127.0.0.1:9/callback",
            "--name",
            name,
            "--id",
            id,
        ],
    )
}

#[test]
fn test_list_empty() {
    let temp = TempDir::new().unwrap();
    let output = nvl(temp.path(), &["issuer", "list"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("No issuers configured"));
}

#[test]
fn test_add_then_list() {
    let temp = TempDir::new().unwrap();

    let output = add_issuer(temp.path(), "Local Dev", "local-dev");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(temp.path().join("issuers/local-dev.yaml").exists());
    assert!(temp.path().join("sessions/local-dev.json").exists());

    let output = nvl(temp.path(), &["issuer", "list"]);
    let listing = stdout(&output);
    assert!(listing.contains("local-dev"));
    assert!(listing.contains("Local Dev"));
    assert!(listing.contains("http://127.0.0.1:9"));
}

#[test]
fn test_add_duplicate_id_fails() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());

    let output = add_issuer(temp.path(), "Alpha again", "alpha");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("already exists"));
}

#[test]
fn test_info_hides_secret() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());

    let output = nvl(temp.path(), &["issuer", "info", "alpha"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let info = stdout(&output);
    assert!(info.contains("client-1"));
    assert!(!info.contains("very-secret"));

    let output = nvl(temp.path(), &["issuer", "info", "alpha", "--show-secret"]);
    assert!(stdout(&output).contains("very-secret"));
}

#[test]
fn test_default_set_show_and_clear() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());
    assert!(add_issuer(temp.path(), "Beta", "beta").status.success());

    let output = nvl(temp.path(), &["issuer", "default", "--set", "beta"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = nvl(temp.path(), &["issuer", "default"]);
    assert!(stdout(&output).contains("ID:\tbeta"));

    let output = nvl(temp.path(), &["issuer", "default", "--clear"]);
    assert!(output.status.success());

    let output = nvl(temp.path(), &["issuer", "default"]);
    assert!(stdout(&output).contains("No default issuer set"));
}

#[test]
fn test_delete_default_clears_it() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());
    assert!(nvl(temp.path(), &["issuer", "default", "--set", "alpha"]).status.success());

    let output = nvl(temp.path(), &["issuer", "del", "alpha", "--force"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!temp.path().join("issuers/alpha.yaml").exists());
    assert!(!temp.path().join("sessions/alpha.json").exists());

    let output = nvl(temp.path(), &["issuer", "default"]);
    assert!(stdout(&output).contains("No default issuer set"));
}

#[test]
fn test_logout_without_issuers_fails() {
    let temp = TempDir::new().unwrap();
    let output = nvl(temp.path(), &["logout"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: no configured issuers"));
}

#[test]
fn test_ambiguous_choice_without_terminal_fails() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());
    assert!(add_issuer(temp.path(), "Beta", "beta").status.success());

    // Two issuers, no default and no input: the prompt is cancelled.
    let output = nvl(temp.path(), &["logout"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no selection made"));
}

#[test]
fn test_admin_command_requires_login() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());

    let output = nvl(temp.path(), &["user", "list"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not logged in"));
}

#[test]
fn test_edit_renames_issuer_and_moves_default() {
    let temp = TempDir::new().unwrap();
    assert!(add_issuer(temp.path(), "Alpha", "alpha").status.success());
    assert!(add_issuer(temp.path(), "Other", "other").status.success());
    assert!(nvl(temp.path(), &["issuer", "default", "--set", "alpha"]).status.success());

    let output = nvl(
        temp.path(),
        &[
            "issuer",
            "edit",
            "alpha",
            "--force",
            "--issuer-uri",
            "http://127.0.0.1:9",
            "--client-id",
            "client-2",
            "--client-secret",
            "new-secret",
            "--redirect-uri",
            "http://127.0.0.1:9/callback",
            "--name",
            "Beta Server",
            "--id",
            "Beta_Server",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    assert!(!temp.path().join("issuers/alpha.yaml").exists());
    assert!(!temp.path().join("sessions/alpha.json").exists());
    assert!(temp.path().join("issuers/beta-server.yaml").exists());
    assert!(temp.path().join("sessions/beta-server.json").exists());

    let listing = stdout(&nvl(temp.path(), &["issuer", "list"]));
    assert!(listing.contains("beta-server"));
    assert!(!listing.contains("alpha"));

    let output = nvl(temp.path(), &["issuer", "default"]);
    assert!(stdout(&output).contains("ID:\tbeta-server"));

    let output = nvl(temp.path(), &["issuer", "info", "beta-server", "--show-secret"]);
    let info = stdout(&output);
    assert!(info.contains("client-2"));
    assert!(info.contains("new-secret"));
}

#[test]
fn test_edit_declining_self_signed_removes_legacy_certificate() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("issuers")).unwrap();
    fs::write(
        temp.path().join("issuers/secure.yaml"),
        "name: Secure\n\
         issuer: https://127.0.0.1:9\n\
         client_id: client-1\n\
         client_secret: very-secret\n\
         redirect_uri: https://127.0.0.1:9/callback\n\
         caCertPath: /nonexistent/ca.pem\n",
    )
    .unwrap();

    let output = nvl_with_input(
        temp.path(),
        &[
            "issuer",
            "edit",
            "secure",
            "--force",
            "--issuer-uri",
            "https://127.0.0.1:9",
            "--client-id",
            "client-1",
            "--client-secret",
            "very-secret",
            "--redirect-uri",
            "https://127.0.0.1:9/callback",
            "--name",
            "Secure",
            "--id",
            "secure",
        ],
        "n\n",
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let contents = fs::read_to_string(temp.path().join("issuers/secure.yaml")).unwrap();
    assert!(!contents.contains("caCertPath"));
    assert!(!contents.contains("ca_cert_path"));
    assert!(contents.contains("client_id: client-1"));

    let output = nvl(temp.path(), &["issuer", "info", "secure"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!stdout(&output).contains("CA SSL Cert"));
}
