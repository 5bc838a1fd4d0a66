use expbox_doe::{DesignMethod, Factor, MorrisParams, NoMonitor, NolhRegistry, SensitivityList};

fn main() {
    let factors = SensitivityList::new(vec![
        Factor::parameter("alpha", vec![0., 1.]),
        Factor::parameter("beta", vec![-10., 10.]),
        Factor::parameter("n", vec![5., 15.]).integer(true),
        Factor::parameter("fixed", vec![3.]),
    ])
    .expect("valid factors");
    let mut registry = NolhRegistry::new();

    println!("Sample space ({} factors, 'fixed' held constant)", factors.dimension());
    println!("{}\n", factors.xlimits());

    let methods = [
        DesignMethod::Random {
            samples: 10,
            seed: 42,
        },
        DesignMethod::Nolh { extended: false },
        DesignMethod::Nolh { extended: true },
        DesignMethod::Morris(MorrisParams::new().pool_size(20).trajectories(3).seed(42)),
    ];
    for method in methods {
        println!("*** using {} sampling", method.name());
        let table = method
            .generate(&factors, &mut registry, None, &mut NoMonitor)
            .expect("design generated");
        println!("{}\n", table.values());
    }
}
