//! Transform-dialect matmul strategy templating.
//!
//! Produces the MLIR source of a `fill + matmul` problem and the compiler flag
//! lists used to benchmark it with and without a transform-dialect strategy.

use crate::compare::Tolerance;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

const FILL_MATMUL_F32: &str = r#"
!input_tensor_t = tensor<${M}x${K}xf32>
!weight_tensor_t = tensor<${K}x${N}xf32>
!output_tensor_t = tensor<${M}x${N}xf32>
func.func @${FN_NAME}(%in: !input_tensor_t, %wei: !weight_tensor_t) -> !output_tensor_t {
  %cst_0 = arith.constant 0.0 : f32
  %empty = tensor.empty() : !output_tensor_t
  %out = linalg.fill ins(%cst_0 : f32) outs(%empty : !output_tensor_t) -> !output_tensor_t
  %res = linalg.matmul
     ins(%in, %wei: !input_tensor_t, !weight_tensor_t)
    outs(%out: !output_tensor_t) -> !output_tensor_t
  return %res : !output_tensor_t
}
"#;

const COMMON_OPTIONS: [&str; 4] = [
    "--iree-hal-benchmark-dispatch-repeat-count=2",
    "--iree-stream-resource-index-bits=64",
    "--iree-vm-target-index-bits=64",
    "--iree-hal-cuda-llvm-target-arch=sm_80",
];

/// Parameters of the GPU matmul strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Block tile sizes, e.g. `"128,128,32"`.
    pub blk: String,
    /// Threads per block, e.g. `"64,2,1"`.
    pub tds: String,
    /// Warps per block, e.g. `"2,2,1"`.
    pub wps: String,
    /// Pipeline depth.
    pub p: u32,
    /// Reduction tile size.
    pub r: u32,
    /// Use async copies.
    pub acp: bool,
    /// Use `mma.sync`.
    pub mma: bool,
}

impl StrategyConfig {
    /// `(key, value)` pairs in flag order.
    pub fn items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("blk", self.blk.clone()),
            ("tds", self.tds.clone()),
            ("wps", self.wps.clone()),
            ("p", self.p.to_string()),
            ("r", self.r.to_string()),
            ("acp", self.acp.to_string()),
            ("mma", self.mma.to_string()),
        ]
    }
}

/// A templated matmul problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatmulProblem {
    pub fn_name: String,
    pub mlir: String,
}

/// Instantiates the f32 `fill + matmul` template for `M x K` times `K x N`.
pub fn make_fill_matmul_f32_problem(
    m: usize,
    n: usize,
    k: usize,
    config: Option<&StrategyConfig>,
) -> MatmulProblem {
    let mut fn_name = format!("mm_{}_{}_{}", m, n, k);
    if let Some(config) = config {
        let suffix: Vec<String> = config
            .items()
            .into_iter()
            .map(|(key, value)| format!("{}_{}", key, value))
            .collect();
        fn_name = format!("{}_{}", fn_name, suffix.join("_"));
    }
    let fn_name = fn_name.replace(',', "_");

    let mlir = FILL_MATMUL_F32
        .replace("${M}", &m.to_string())
        .replace("${K}", &k.to_string())
        .replace("${N}", &n.to_string())
        .replace("${FN_NAME}", &fn_name);

    MatmulProblem { fn_name, mlir }
}

pub fn append_td_repro_options(mut options: Vec<String>, td_repro: bool) -> Vec<String> {
    if td_repro {
        options.push("--debug-only=transform-dialect-save-repro".to_string());
        options.push("--mlir-disable-threading".to_string());
    }
    options
}

/// Flags for compiling without a transform-dialect strategy.
pub fn make_iree_baseline_options(td_repro: bool) -> Vec<String> {
    let mut options: Vec<String> = COMMON_OPTIONS.iter().map(|s| s.to_string()).collect();
    options.push("--iree-codegen-llvmgpu-enable-transform-dialect-jit=false".to_string());
    append_td_repro_options(options, td_repro)
}

/// Flags for compiling with the strategy described by `config`.
pub fn make_iree_td_options(config: &StrategyConfig, td_repro: bool) -> Vec<String> {
    let mut options: Vec<String> = COMMON_OPTIONS.iter().map(|s| s.to_string()).collect();
    options.extend([
        format!("--td-matmul-strategy-blk-sizes={}", config.blk),
        format!("--td-matmul-strategy-num-threads={}", config.tds),
        format!("--td-matmul-strategy-num-warps={}", config.wps),
        format!("--td-matmul-strategy-pipeline-depth={}", config.p),
        format!("--td-matmul-strategy-reduc-size={}", config.r),
        format!("--td-matmul-strategy-use-async-copies={}", config.acp),
        format!("--td-matmul-strategy-use-mma-sync={}", config.mma),
        "--iree-codegen-llvmgpu-enable-transform-dialect-aligned-matmul".to_string(),
        "--iree-flow-enable-pad-handling".to_string(),
        "--iree-codegen-llvmgpu-enable-transform-dialect-pad-strategy".to_string(),
    ]);
    append_td_repro_options(options, td_repro)
}

/// Adds the dispatch graph script flag when a script file is given.
pub fn append_td_graph_script(mut options: Vec<String>, filename: Option<&str>) -> Vec<String> {
    if let Some(filename) = filename {
        options.push(format!("--iree-flow-dispatch-use-transform-dialect={}", filename));
    }
    options
}

/// Tolerance for checking a matmul with reduction size `k` whose operands
/// and result are `tensors`. Assumes TF32 accumulation.
pub fn compute_precision(k: usize, tensors: &[&Tensor]) -> Tolerance {
    let max_value = tensors.iter().fold(0.0f32, |acc, t| acc.max(t.max_abs()));
    let rtol = 1e-4;
    Tolerance::new(rtol, rtol * max_value * k as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ElementType;

    fn config() -> StrategyConfig {
        StrategyConfig {
            blk: "128,128,32".to_string(),
            tds: "64,2,1".to_string(),
            wps: "2,2,1".to_string(),
            p: 3,
            r: 16,
            acp: true,
            mma: false,
        }
    }

    #[test]
    fn test_problem_without_strategy() {
        let problem = make_fill_matmul_f32_problem(123, 456, 789, None);
        assert_eq!(problem.fn_name, "mm_123_456_789");
        assert!(problem.mlir.contains("!input_tensor_t = tensor<123x789xf32>"));
        assert!(problem.mlir.contains("!weight_tensor_t = tensor<789x456xf32>"));
        assert!(problem.mlir.contains("!output_tensor_t = tensor<123x456xf32>"));
        assert!(problem.mlir.contains("func.func @mm_123_456_789("));
        assert!(!problem.mlir.contains("${"));
    }

    #[test]
    fn test_problem_name_includes_strategy_without_commas() {
        let problem = make_fill_matmul_f32_problem(8, 16, 32, Some(&config()));
        assert_eq!(
            problem.fn_name,
            "mm_8_16_32_blk_128_128_32_tds_64_2_1_wps_2_2_1_p_3_r_16_acp_true_mma_false"
        );
        assert!(!problem.fn_name.contains(','));
        assert!(problem.mlir.contains(&format!("@{}(", problem.fn_name)));
    }

    #[test]
    fn test_baseline_options() {
        let options = make_iree_baseline_options(false);
        assert_eq!(options.len(), 5);
        assert_eq!(
            options.last().map(String::as_str),
            Some("--iree-codegen-llvmgpu-enable-transform-dialect-jit=false")
        );

        let repro = make_iree_baseline_options(true);
        assert_eq!(repro.len(), 7);
        assert_eq!(repro[5], "--debug-only=transform-dialect-save-repro");
        assert_eq!(repro[6], "--mlir-disable-threading");
    }

    #[test]
    fn test_td_options_carry_strategy() {
        let options = make_iree_td_options(&config(), false);
        assert!(options.contains(&"--td-matmul-strategy-blk-sizes=128,128,32".to_string()));
        assert!(options.contains(&"--td-matmul-strategy-pipeline-depth=3".to_string()));
        assert!(options.contains(&"--td-matmul-strategy-use-async-copies=true".to_string()));
        assert!(options.contains(&"--td-matmul-strategy-use-mma-sync=false".to_string()));
        assert!(!options.iter().any(|o| o.contains("transform-dialect-jit")));
    }

    #[test]
    fn test_graph_script_is_optional() {
        let base = vec!["--a".to_string()];
        assert_eq!(append_td_graph_script(base.clone(), None), base);

        let with_script = append_td_graph_script(base, Some("/tmp/strategy.mlir"));
        assert_eq!(
            with_script[1],
            "--iree-flow-dispatch-use-transform-dialect=/tmp/strategy.mlir"
        );
    }

    #[test]
    fn test_compute_precision() {
        let a = Tensor::new(vec![2], ElementType::F32, vec![0.5, -4.0]).unwrap();
        let b = Tensor::new(vec![2], ElementType::F32, vec![2.0, 1.0]).unwrap();
        let tolerance = compute_precision(10, &[&a, &b]);
        assert_eq!(tolerance.rtol, 1e-4);
        assert!((tolerance.atol - 1e-4 * 4.0 * 10.0).abs() < 1e-9);
    }
}
