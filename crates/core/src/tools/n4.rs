//! ANTs `N4BiasFieldCorrection`.

use super::{path_arg, Invocation, ToolCommand};
use crate::config::N4Params;
use std::path::Path;

impl N4Params {
    /// `--convergence` value: iterations per level joined by `x`, then the threshold.
    fn convergence_arg(&self) -> String {
        let levels: Vec<String> = self.iterations.iter().map(u32::to_string).collect();
        format!("[{},{}]", levels.join("x"), self.convergence_threshold)
    }
}

impl ToolCommand for N4Params {
    fn program(&self) -> &str {
        &self.program
    }

    fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let args = vec![
            "-d".into(),
            self.dimension.to_string().into(),
            "--input-image".into(),
            path_arg(input),
            "--output".into(),
            path_arg(output),
            "--shrink-factor".into(),
            self.shrink_factor.to_string().into(),
            "--convergence".into(),
            self.convergence_arg().into(),
            "--bspline-fitting".into(),
            format!("[{}]", self.bspline_fitting_distance).into(),
        ];

        Invocation {
            program: self.program.clone(),
            args,
            env: Vec::new(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }
}
