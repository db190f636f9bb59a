use std::process::Command;

fn main() {
    let commit = git(&["rev-parse", "--short", "HEAD"]);

    // 构建时间（UTC），不引入 chrono，直接调用 date
    let build_time = run_trimmed(Command::new("date").args(["-u", "+%Y-%m-%dT%H:%M:%SZ"]));

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SITEWATCH_GIT_COMMIT={commit}");
    println!("cargo:rustc-env=SITEWATCH_BUILD_TIME={build_time}");
    println!("cargo:rustc-env=SITEWATCH_BUILD_TARGET={target}");
    println!("cargo:rustc-env=SITEWATCH_BUILD_PROFILE={profile}");

    // 仅在 git HEAD 变化时重新运行
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}

fn git(args: &[&str]) -> String {
    run_trimmed(Command::new("git").args(args))
}

fn run_trimmed(cmd: &mut Command) -> String {
    cmd.output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
