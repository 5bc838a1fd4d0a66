/*!
This library implements Design of Experiments (DoE) methods used to explore the
parameter space of a simulation model and to prepare sensitivity analyses.

A study declares an ordered list of factors ([SensitivityList]), each factor having
a list of values. Factors with a single value are held constant, the others span
the sample space `xlimits`, a 2D ndarray `(k, 2)` of lower and upper bounds.

Example:
```
use expbox_doe::{Factor, Morris, Nolh, NolhRegistry, Random, SamplingMethod, SensitivityList};
use linfa::ParamGuard;

let factors = SensitivityList::new(vec![
    Factor::parameter("alpha", vec![0.1, 0.9]),
    Factor::parameter("beta", vec![5., 10.]),
    Factor::parameter("gamma", vec![1.]),
]).unwrap();
// Design space is defined as [0.1, 0.9] x [5., 10.], gamma is held constant.
let xlimits = factors.xlimits();
// Near-Orthogonal Latin Hypercube from the smallest built-in table handling 2 factors
let mut registry = NolhRegistry::new();
let table = registry.select(factors.dimension(), None).unwrap();
let samples = Nolh::new(&xlimits, table, false).unwrap().sample().unwrap();
// or else randomly with a seed for reproducibility
let samples = Random::new(&xlimits, 20).seed(42).sample().unwrap();
// or else Morris trajectories for Elementary Effects analysis
let params = Morris::<f64>::params().pool_size(20).trajectories(4).check().unwrap();
let samples = Morris::new(&xlimits, &params).unwrap().sample().unwrap();
```

This library contains the following methods:
* [Full Factorial enumeration](FullFactorial), either writing
  combinations in branches of one configuration or persisting one configuration per combination,
* [Near-Orthogonal Latin Hypercube](Nolh) from built-in or user tables,
* [Random Sampling](Random),
* [Morris trajectories](Morris) selected to cover the sample space.

Designs are gathered in a [DesignTable] by a [DesignMethod], then written and
materialized as model configurations by the [DesignWriter].
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod combinatorics;
mod design;
mod errors;
mod factor;
mod full_factorial;
mod morris;
mod nolh;
mod random;
mod traits;
mod utils;
mod writer;

pub use design::*;
pub use errors::*;
pub use factor::*;
pub use full_factorial::*;
pub use morris::*;
pub use nolh::*;
pub use random::*;
pub use traits::*;
pub use writer::*;

/// Environment variable controlling the log level of expbox tools
pub const EXPBOX_LOG: &str = "EXPBOX_LOG";
