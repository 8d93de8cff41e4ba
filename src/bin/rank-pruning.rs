#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

use docopt::Docopt;
use std::process;

use rank_pruning::classifier::KNN;
use rank_pruning::rp::{Estimation, FitConfig, RankPruning};
use rank_pruning::utils::{load_data, load_probabilities, store_predictions, store_vector};
use rank_pruning::{Error, LearningResult};

const USAGE: &'static str = "
Train a classifier on noisy labels with Rank Pruning.

If <testing-file> is specified, the predicted probabilities of its
examples are written to <output-file>. Otherwise, <output-file> gets
the noise mask of the training examples (true for pruned examples).

Data files contain one example per line: label, x1, x2, ...

Usage: rank-pruning knn [--knn=<k>] [options] [--] <output-file> <training-file> [<testing-file>]
       rank-pruning (--help | --version)

Options:
    -k, --knn=<kn>              Number of neighbors for k-NN [default: 5].
    --folds=<n>                 Cross-validation folds [default: 5].
    --seed=<seed>               PRNG seed for the cross-validation folds.
    --prune-method=<method>     prune_by_class, prune_by_noise_rate or both
                                [default: prune_by_noise_rate].
    --count-method=<method>     inverse_nm_dot_s or calibrate_confident_joint
                                [default: inverse_nm_dot_s].
    --py-method=<method>        cnt, eqn or marginal [default: marginal].
    --converge                  Reconcile the latent estimates.
    --pulearning=<class>        Class without label noise.
    --frac-noise=<frac>         Fraction of the estimated noise to prune
                                [default: 1.0].
    --psx=<file>                Out-of-fold predicted probabilities of the
                                training examples, one row per example.
    -h, --help                  Show help.
    --version                   Show the version.
";

#[derive(Deserialize)]
struct Args {
    flag_knn: usize,
    flag_folds: usize,
    flag_seed: Option<u64>,
    flag_prune_method: String,
    flag_count_method: String,
    flag_py_method: String,
    flag_converge: bool,
    flag_pulearning: Option<usize>,
    flag_frac_noise: f64,
    flag_psx: Option<String>,
    arg_training_file: String,
    arg_testing_file: Option<String>,
    arg_output_file: String,
    cmd_knn: bool,
}

fn run(args: Args) -> LearningResult<()> {
    let knn = if args.cmd_knn {
        KNN::new(args.flag_knn)
    } else {
        return Err(Error::InputValidation("Missing classifier command".to_string()));
    };

    let config = FitConfig {
        cv_n_folds: args.flag_folds,
        pulearning: args.flag_pulearning,
        prune_method: args.flag_prune_method.parse()?,
        count_method: args.flag_count_method.parse()?,
        converge_latent_estimates: args.flag_converge,
        py_method: args.flag_py_method.parse()?,
        frac_noise: args.flag_frac_noise,
        ..FitConfig::default()
    };

    let (train_inputs, train_targets) = load_data(&args.arg_training_file)?;
    let psx = match args.flag_psx {
        Some(ref fname) => Some(load_probabilities(fname)?),
        None => None,
    };
    let estimation = match psx {
        Some(ref psx) => Estimation::ProbabilitiesProvided {
            psx: psx.view(),
            thresholds: None,
        },
        None => Estimation::default(),
    };

    let mut rp = match args.flag_seed {
        Some(seed) => RankPruning::new_seeded(knn, seed),
        None => RankPruning::new(knn),
    };

    let result = rp.fit(&train_inputs.view(), &train_targets.view(), estimation, &config)?;
    info!("Pruned {} of {} training examples", result.num_pruned(), train_targets.len());

    if let Some(testing_file) = args.arg_testing_file {
        info!("Predicting {}", testing_file);
        let (test_inputs, _) = load_data(&testing_file)?;
        let probabilities = rp.predict_probabilities(&test_inputs.view())?;
        store_predictions(probabilities.view(), &args.arg_output_file)
    } else {
        store_vector(result.noise_mask.view(), &args.arg_output_file)
    }
}

fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
                            .and_then(|d| d.deserialize())
                            .unwrap_or_else(|e| e.exit());

    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}
