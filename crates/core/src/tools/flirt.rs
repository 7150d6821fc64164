//! FSL `flirt` linear registration.

use super::{fsl_output_env, path_arg, Invocation, ToolCommand};
use crate::config::FlirtParams;
use std::ffi::OsString;
use std::path::Path;

impl ToolCommand for FlirtParams {
    fn program(&self) -> &str {
        &self.program
    }

    fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let mut args = vec![
            "-in".into(),
            path_arg(input),
            "-ref".into(),
            path_arg(&self.reference),
            "-out".into(),
            path_arg(output),
            "-bins".into(),
            self.bins.to_string().into(),
            "-cost".into(),
            self.cost.as_str().into(),
        ];
        for (flag, range) in [
            ("-searchrx", self.search_x),
            ("-searchry", self.search_y),
            ("-searchrz", self.search_z),
        ] {
            args.push(flag.into());
            args.push(range.min.to_string().into());
            args.push(range.max.to_string().into());
        }
        let model: [OsString; 4] = [
            "-dof".into(),
            self.dof.to_string().into(),
            "-interp".into(),
            self.interp.as_str().into(),
        ];
        args.extend(model);

        Invocation {
            program: self.program.clone(),
            args,
            env: fsl_output_env(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }
}
