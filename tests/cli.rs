use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const CUBE: &str = "\
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
f 1 2 3 4
f 5 6 7 8
f 1 2 6 5
f 2 3 7 6
f 3 4 8 7
f 4 1 5 8
";

fn write_scene(dir: &TempDir) -> std::path::PathBuf {
    let scene = r#"<scene>
  <object>
    <name>Solo</name>
    <type>sphere</type>
    <position>0 0 0</position>
    <radius>0.5</radius>
  </object>
  <object>
    <name>Cube</name>
    <type>model</type>
    <mesh>cube.obj</mesh>
    <position>0 -1.2 0</position>
    <color>255 204 51</color>
  </object>
</scene>
"#;
    fs::write(dir.path().join("cube.obj"), CUBE).expect("write mesh");
    let path = dir.path().join("scene.xml");
    fs::write(&path, scene).expect("write scene");
    path
}

#[test]
fn default_scene_hovers_middle_sphere() {
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.args(["--summary-only", "--frames", "1"]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 3 objects"))
        .stdout(contains(" - Middle (sphere)"))
        .stdout(contains("frame 0: mouse enter Middle"))
        .stdout(contains(
            " - Middle pos=(0.00, 0.02, 0.00) state=highlighted color=(0.00, 0.00, 1.00)",
        ))
        .stdout(contains(
            " - Left pos=(-2.00, 0.01, 0.00) state=default color=(1.00, 0.00, 0.00)",
        ))
        .stdout(contains("Tracked: Middle"));
}

#[test]
fn built_in_model_loads_from_any_working_directory() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.current_dir(dir.path())
        .args(["--summary-only", "--frames", "1"]);
    cmd.assert()
        .success()
        .stdout(contains("Model Gem scale=1.00"))
        .stdout(contains("Model: absent").not());
}

#[test]
fn click_off_the_spheres_fires_leave() {
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.args([
        "--summary-only",
        "--size",
        "1280x720",
        "--frames",
        "2",
        "--click",
        "640,10@1",
    ]);
    cmd.assert()
        .success()
        .stdout(contains("frame 0: mouse enter Middle"))
        .stdout(contains("frame 1: mouse leave Middle"))
        .stdout(contains("Tracked: none"));
}

#[test]
fn clicking_the_model_scales_it_up() {
    let dir = TempDir::new().expect("temp dir");
    let scene = write_scene(&dir);
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.arg(&scene).args([
        "--summary-only",
        "--size",
        "720x720",
        "--click",
        "360,548",
    ]);
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 objects"))
        .stdout(contains(" - Solo pos=(0.00, 0.00, 0.00) state=default"))
        .stdout(contains("Tracked: none"))
        .stdout(contains("Model Cube scale=1.20"))
        .stdout(contains("mouse enter").not());
}

#[test]
fn missing_mesh_leaves_model_absent() {
    let dir = TempDir::new().expect("temp dir");
    let scene = write_scene(&dir);
    fs::remove_file(dir.path().join("cube.obj")).expect("remove mesh");
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.arg(&scene).arg("--summary-only");
    cmd.assert().success().stdout(contains("Model: absent"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}

#[test]
fn unreadable_scene_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::cargo_bin("raycast-hover").expect("binary exists");
    cmd.arg(dir.path().join("missing.xml")).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to read scene"));
}
