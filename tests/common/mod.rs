//! Shared test infrastructure: a throwaway installer repository with a
//! scripted `install.sh` standing in for the real installer.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Simulates the installer's contract faithfully for every target type.
pub const CONFORMING_INSTALLER: &str = r#"
if [ "$1" != "-s" ] || [ "$2" != "-t" ]; then
    echo "usage: install.sh -s -t <target>" >&2
    exit 64
fi
target="$3"
echo "Installing target $target"
type=$(sed -n 's/^#TARGET type //p' "$target")
case "$type" in
    pkg-install)
        echo "simulated: sudo apt-get update >/dev/null"
        grep -v '^#' "$target" | while read -r line; do
            [ -z "$line" ] && continue
            echo "simulated: sudo apt-get install -y >/dev/null $line"
        done
        ;;
    script)
        interpreter=$(head -n 1 "$target" | sed 's/^#!//')
        echo "simulated: GOODIES_DIR=goodies/ $interpreter $target >/dev/null"
        ;;
    place-files)
        goodies="$(pwd -P)/goodies"
        grep -v '^#' "$target" | while read -r source arrow dest; do
            [ -z "$source" ] && continue
            case "$dest" in
                /*) ;;
                *) dest="$HOME/$dest" ;;
            esac
            echo "simulated: cp -a $goodies/$source $dest"
        done
        ;;
esac
echo "Done."
"#;

pub struct FakeRepo {
    _dir: TempDir,
    pub root: PathBuf,
    pub test_dir: PathBuf,
    pub goodies_dir: PathBuf,
    pub home: PathBuf,
    word_list: PathBuf,
    bin_dir: PathBuf,
}

impl FakeRepo {
    /// Build a repository whose `install.sh` runs `installer_body` under `/bin/sh`.
    pub fn new(installer_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonical temp dir");
        let test_dir = root.join("test");
        let goodies_dir = root.join("goodies");
        let home = root.join("home");
        let bin_dir = root.join("bin");
        for path in [&test_dir, &goodies_dir, &home, &bin_dir] {
            fs::create_dir_all(path).expect("create repo dir");
        }

        for goodie in ["bashrc", "gitconfig", "vimrc"] {
            fs::write(goodies_dir.join(goodie), "# goodie\n").expect("write goodie");
        }
        write_executable(&bin_dir.join("fakeinterp"), "#!/bin/sh\nexit 0\n");
        write_executable(&bin_dir.join("otherinterp"), "#!/bin/sh\nexit 0\n");

        // A large pool keeps target names from colliding across types.
        let word_list = root.join("words");
        let mut words = String::from("badger's\nO'Brien\n");
        for index in 0..1000 {
            words.push_str(&format!("word{index}\n"));
        }
        fs::write(&word_list, words).expect("write words");

        write_executable(
            &root.join("install.sh"),
            &format!("#!/bin/sh\n{installer_body}\n"),
        );

        Self {
            _dir: dir,
            root,
            test_dir,
            goodies_dir,
            home,
            word_list,
            bin_dir,
        }
    }

    /// Run `tconf <subcommand> <args>` from the test directory.
    pub fn tconf(&self, subcommand: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_tconf"))
            .arg(subcommand)
            .arg("--word-list")
            .arg(&self.word_list)
            .arg("--bin-dir")
            .arg(&self.bin_dir)
            .args(args)
            .current_dir(&self.test_dir)
            .env("HOME", &self.home)
            .env_remove("RUST_LOG")
            .output()
            .expect("run tconf")
    }

    /// Target files left in the test directory.
    pub fn fixtures(&self) -> Vec<PathBuf> {
        let mut fixtures: Vec<PathBuf> = fs::read_dir(&self.test_dir)
            .expect("read test dir")
            .map(|entry| entry.expect("dir entry").path())
            .filter(|path| {
                path.extension().and_then(|ext| ext.to_str()) == Some("testtarget")
            })
            .collect();
        fixtures.sort();
        fixtures
    }
}

pub fn sh_available() -> bool {
    let available = Path::new("/bin/sh").is_file();
    if !available {
        eprintln!("Skipping: /bin/sh not available");
    }
    available
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).expect("write executable");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod executable");
}
