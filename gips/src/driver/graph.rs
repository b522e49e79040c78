//! Product dependency graph.
//!
//! Walks `Requirement::Product` edges from the requested products, rejects
//! cycles, and orders the closure so that prerequisites come first. Each
//! product gets a *stage*: 0 when it depends only on assets, otherwise one
//! more than its deepest product dependency. Products of the same stage never
//! depend on each other and can be generated in the same batch.
//!
//! ```text
//!   ndvi ──► ref ──► (asset)        stage(ref)  = 0
//!   evi  ──► ref                    stage(ndvi) = 1, stage(evi) = 1
//! ```

use std::collections::BTreeMap;

use crate::datasource::{DataSource, ProductName};
use crate::error::{GipsError, GipsResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Topologically ordered dependency closure of one or more products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    targets: Vec<ProductName>,
    order: Vec<ProductName>,
    stages: BTreeMap<ProductName, usize>,
}

impl DependencyGraph {
    /// Resolve the closure of a single product.
    pub fn resolve(source: &DataSource, product: &ProductName) -> GipsResult<Self> {
        Self::resolve_all(source, std::slice::from_ref(product))
    }

    /// Resolve the combined closure of several products.
    ///
    /// # Errors
    ///
    /// - [`GipsError::UnknownProduct`] if a product (or dependency) is undefined
    /// - [`GipsError::CyclicDependency`] if the closure contains a cycle
    pub fn resolve_all(source: &DataSource, products: &[ProductName]) -> GipsResult<Self> {
        let mut graph = Self {
            targets: products.to_vec(),
            order: Vec::new(),
            stages: BTreeMap::new(),
        };
        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        for product in products {
            graph.visit(source, product, &mut marks, &mut path)?;
        }
        Ok(graph)
    }

    fn visit(
        &mut self,
        source: &DataSource,
        product: &ProductName,
        marks: &mut BTreeMap<ProductName, Mark>,
        path: &mut Vec<ProductName>,
    ) -> GipsResult<usize> {
        match marks.get(product) {
            Some(Mark::Done) => return Ok(self.stages[product]),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| p == product).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(product.clone());
                return Err(GipsError::CyclicDependency { cycle });
            }
            None => {}
        }

        let spec = source
            .product(product)
            .ok_or_else(|| GipsError::UnknownProduct {
                datasource: source.name.clone(),
                product: product.clone(),
            })?;

        marks.insert(product.clone(), Mark::Visiting);
        path.push(product.clone());

        let mut stage = 0;
        for dependency in spec.product_requirements() {
            stage = stage.max(self.visit(source, dependency, marks, path)? + 1);
        }

        path.pop();
        marks.insert(product.clone(), Mark::Done);
        self.order.push(product.clone());
        self.stages.insert(product.clone(), stage);
        Ok(stage)
    }

    /// Products that were asked for.
    pub fn targets(&self) -> &[ProductName] {
        &self.targets
    }

    /// The closure, prerequisites first.
    pub fn order(&self) -> &[ProductName] {
        &self.order
    }

    /// Stage of a product in the closure (0 for unknown products).
    pub fn stage(&self, product: &ProductName) -> usize {
        self.stages.get(product).copied().unwrap_or(0)
    }

    pub fn contains(&self, product: &ProductName) -> bool {
        self.stages.contains_key(product)
    }

    /// Number of stages (one more than the deepest stage).
    pub fn depth(&self) -> usize {
        self.stages.values().max().map_or(0, |s| s + 1)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::datasource::{
        catalog, AssetSpec, AssetType, ProductSpec, Requirement, Sensor, TileGrid,
    };

    pub(crate) fn name(s: &str) -> ProductName {
        ProductName::new(s).unwrap()
    }

    /// Data source whose products depend on each other as listed.
    pub(crate) fn chain_source(edges: &[(&str, &[&str])]) -> DataSource {
        let mut products = BTreeMap::new();
        for (product, deps) in edges {
            let mut requires = vec![Requirement::Asset(AssetType::new("raw").unwrap())];
            requires.extend(deps.iter().map(|d| Requirement::Product(name(d))));
            products.insert(
                name(product),
                ProductSpec {
                    description: String::new(),
                    requires,
                    sensors: vec![Sensor::new("S1").unwrap()],
                    group: None,
                },
            );
        }
        DataSource {
            name: "synthetic".to_string(),
            description: String::new(),
            grid: TileGrid::new("EPSG:4326", BTreeMap::new()),
            sensors: [(Sensor::new("S1").unwrap(), String::new())].into_iter().collect(),
            assets: vec![AssetSpec {
                asset_type: AssetType::new("raw").unwrap(),
                template: "{sensor}_{tile}_{date}.raw".to_string(),
                fill: String::new(),
                description: String::new(),
            }],
            products,
            default_resolution: (1.0, 1.0),
        }
    }

    #[test]
    fn test_prerequisites_first() {
        let ds = catalog::landsat();
        let graph = DependencyGraph::resolve(&ds, &name("ndvi")).unwrap();
        assert_eq!(graph.order(), &[name("ref"), name("ndvi")]);
        assert_eq!(graph.stage(&name("ref")), 0);
        assert_eq!(graph.stage(&name("ndvi")), 1);
        assert_eq!(graph.depth(), 2);
    }

    #[test]
    fn test_shared_dependency_listed_once() {
        let ds = catalog::landsat();
        let graph = DependencyGraph::resolve_all(&ds, &[name("ndvi"), name("evi")]).unwrap();
        assert_eq!(graph.order(), &[name("ref"), name("ndvi"), name("evi")]);
        assert_eq!(graph.targets().len(), 2);
    }

    #[test]
    fn test_diamond_stages() {
        let ds = chain_source(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"]), ("d", &["c"])]);
        let graph = DependencyGraph::resolve(&ds, &name("d")).unwrap();
        assert_eq!(graph.stage(&name("a")), 0);
        assert_eq!(graph.stage(&name("b")), 1);
        assert_eq!(graph.stage(&name("c")), 2);
        assert_eq!(graph.stage(&name("d")), 3);
        let pos = |p: &str| graph.order().iter().position(|x| x.as_str() == p).unwrap();
        assert!(pos("a") < pos("b") && pos("b") < pos("c") && pos("c") < pos("d"));
    }

    #[test]
    fn test_cycle_detected() {
        let ds = chain_source(&[("p", &["q"]), ("q", &["p"])]);
        let err = DependencyGraph::resolve(&ds, &name("p")).unwrap_err();
        match err {
            GipsError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec![name("p"), name("q"), name("p")]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle_detected() {
        let ds = chain_source(&[("p", &["p"])]);
        assert!(matches!(
            DependencyGraph::resolve(&ds, &name("p")),
            Err(GipsError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_product() {
        let ds = catalog::landsat();
        assert!(matches!(
            DependencyGraph::resolve(&ds, &name("lai")),
            Err(GipsError::UnknownProduct { .. })
        ));
    }
}
