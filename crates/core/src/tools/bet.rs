//! FSL `bet` brain extraction.

use super::{fsl_output_env, path_arg, Invocation, ToolCommand};
use crate::config::BetParams;
use std::ffi::OsString;
use std::path::Path;

impl ToolCommand for BetParams {
    fn program(&self) -> &str {
        &self.program
    }

    fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let mut args = vec![path_arg(input), path_arg(output)];
        if self.robust {
            args.push("-R".into());
        }
        let thresholds: [OsString; 4] = [
            "-f".into(),
            self.fractional_intensity.to_string().into(),
            "-g".into(),
            self.vertical_gradient.to_string().into(),
        ];
        args.extend(thresholds);

        Invocation {
            program: self.program.clone(),
            args,
            env: fsl_output_env(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }
}
