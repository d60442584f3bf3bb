// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argv construction for the privileged helper binary (spec.md §6):
//!
//! ```text
//! <helper> --workspace-id <wid> --cwd <path>
//!          [--env KEY=VALUE ...]
//!          <sandbox-args...>
//!          -- <command> <args...>
//! ```

use crate::policy::ExecOpts;
use std::path::Path;

pub const DEFAULT_HELPER_BIN: &str = "vibe80-helper";

/// Build the full argv for invoking the privileged helper, not including
/// the helper binary path itself.
pub fn build_helper_argv(workspace_id: &str, opts: &ExecOpts, argv: &[String]) -> Vec<String> {
    let mut out = vec!["--workspace-id".to_string(), workspace_id.to_string()];

    if let Some(cwd) = &opts.cwd {
        out.push("--cwd".to_string());
        out.push(cwd.display().to_string());
    }

    for (key, value) in opts.whitelisted_env() {
        out.push("--env".to_string());
        out.push(format!("{key}={value}"));
    }

    if let Some(policy) = &opts.sandbox {
        out.extend(sandbox_args(policy, &opts.cwd));
    }

    out.push("--".to_string());
    out.extend(argv.iter().cloned());
    out
}

fn sandbox_args(policy: &crate::policy::SandboxPolicy, cwd: &Option<std::path::PathBuf>) -> Vec<String> {
    let mut args = Vec::new();

    let mut rw_roots: Vec<&Path> =
        vec![policy.repo_dir.as_path(), policy.tmp_dir.as_path(), policy.attachments_dir.as_path()];
    if let Some(cwd) = cwd {
        rw_roots.push(cwd.as_path());
    }
    for root in rw_roots {
        args.push("--rw".to_string());
        args.push(root.display().to_string());
    }
    for extra in &policy.extra_allow_rw {
        args.push("--rw".to_string());
        args.push(extra.display().to_string());
    }
    for extra in &policy.extra_allow_rw_files {
        args.push("--rw-file".to_string());
        args.push(extra.display().to_string());
    }

    args.push("--net".to_string());
    args.push(policy.net_mode.as_helper_arg().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{NetMode, SandboxPolicy};

    #[test]
    fn builds_expected_shape() {
        let opts = ExecOpts {
            cwd: Some("/home/w1/sessions/s1/repository".into()),
            env: vec![("TERM".into(), "xterm".into())],
            sandbox: Some(SandboxPolicy {
                repo_dir: "/home/w1/sessions/s1/repository".into(),
                tmp_dir: "/home/w1/sessions/s1/tmp".into(),
                attachments_dir: "/home/w1/sessions/s1/attachments".into(),
                internet_access: false,
                net_mode: NetMode::None,
                extra_allow_rw: vec![],
                extra_allow_rw_files: vec![],
            }),
        };
        let argv = build_helper_argv("w1", &opts, &["git".into(), "status".into()]);
        assert_eq!(argv[0], "--workspace-id");
        assert_eq!(argv[1], "w1");
        assert!(argv.contains(&"--cwd".to_string()));
        assert!(argv.contains(&"TERM=xterm".to_string()));
        let dashdash = argv.iter().position(|a| a == "--").unwrap();
        assert_eq!(&argv[dashdash + 1..], &["git".to_string(), "status".to_string()]);
    }
}
