//! Configuration and parameter parsing as seen by the CLI

use std::io::Write;

use graphann_core::config::{LogFormat, LogLevel};
use graphann_core::{Config, ElementType, Error, Metric};
use tempfile::NamedTempFile;

// ============================================================================
// Config files
// ============================================================================

#[test]
fn test_full_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[build]
max_degree = 64
l_build = 128
alpha = 1.2
num_threads = 8
batch_fraction = 0.05
seed = 42

[search]
k = 10
l_search = 100
visit_limit = 5000

[logging]
level = "warn"
format = "json"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let build = config.build.to_params();
    assert_eq!(build.max_degree, 64);
    assert_eq!(build.num_threads, 8);
    assert_eq!(build.seed, 42);
    assert_eq!(config.search.to_params().visit_limit, Some(5000));
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = Config::from_toml("[search]\nl_search = 50\n").unwrap();
    assert_eq!(config.search.l_search, 50);
    assert_eq!(config.search.k, 10);
    assert_eq!(config.build, Config::default().build);
    assert!(config.build.to_params().num_threads >= 1);
}

#[test]
fn test_invalid_values_rejected() {
    for text in [
        "[build]\nmax_degree = 0\n",
        "[build]\nmax_degree = 64\nl_build = 32\n",
        "[build]\nalpha = 0.5\n",
        "[search]\nk = 20\nl_search = 10\n",
        "[logging]\nlevel = \"loud\"\n",
    ] {
        let err = Config::from_toml(text).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "{}: {:?}", text, err);
    }
}

#[test]
fn test_missing_config_file() {
    let err = Config::from_file("/nonexistent/graphann.toml").unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

// ============================================================================
// Names accepted on the command line
// ============================================================================

#[test]
fn test_metric_names() {
    for name in ["Euclidian", "euclidean", "L2", "squared_euclidean"] {
        assert_eq!(name.parse::<Metric>().unwrap(), Metric::SquaredEuclidean, "{}", name);
    }
    for name in ["mips", "inner_product", "IP"] {
        assert_eq!(name.parse::<Metric>().unwrap(), Metric::InnerProduct, "{}", name);
    }
    assert!("cosine".parse::<Metric>().is_err());
}

#[test]
fn test_element_type_names() {
    assert_eq!("uint8".parse::<ElementType>().unwrap(), ElementType::Uint8);
    assert_eq!("i8".parse::<ElementType>().unwrap(), ElementType::Int8);
    assert_eq!("float".parse::<ElementType>().unwrap(), ElementType::Float32);
    assert_eq!("int16".parse::<ElementType>().unwrap().size(), 2);
    assert!("float64".parse::<ElementType>().is_err());
}
