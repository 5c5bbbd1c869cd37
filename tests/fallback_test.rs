use flow_configurator::{
    data_structures::scene_graph::{NodeKind, SceneNode},
    error::LoadError,
    fallback::{Archetype, FallbackResolver, ModelSource, model_number, placeholder},
    normalize::NormalizeStrategy,
    resources::ParsedAsset,
};

use crate::common::test_utils::{
    ScriptedLoader, assert_close, assert_point_close, connector_asset, event_log,
};

mod common;

fn unavailable(reference: &str) -> LoadError {
    LoadError::unavailable(reference, &anyhow::anyhow!("404 Not Found"))
}

fn resolver() -> FallbackResolver {
    FallbackResolver::new("assets", NormalizeStrategy::DIRECT_RETRY)
}

fn placeholder_mesh(root: &SceneNode) -> &SceneNode {
    root.find_by_name("placeholder_mesh")
        .expect("placeholder has a mesh node")
}

#[test]
fn should_extract_model_numbers_from_file_names() {
    assert_eq!(model_number("assets/model007.glb"), Some("007"));
    assert_eq!(model_number("model42.glb"), Some("42"));
    assert_eq!(model_number("https://cdn.example.com/products/model3.GLB?v=2"), Some("3"));
    assert_eq!(model_number("C:\\models\\model12.glb"), Some("12"));
    assert_eq!(model_number("my_model12.glb"), Some("12"));
    assert_eq!(model_number("model.glb"), None);
    assert_eq!(model_number("model12.gltf"), None);
    assert_eq!(model_number("model12-v2.glb"), None);
    assert_eq!(model_number("model12/connector.glb"), None);
    assert_eq!(model_number("connector-v2.glb"), None);
}

#[test]
fn should_build_canonical_paths_below_the_base() {
    assert_eq!(
        resolver().canonical_path("uploads/2024/model007.glb"),
        Some("assets/model007.glb".to_string())
    );
    assert_eq!(
        FallbackResolver::new("cdn/models/", NormalizeStrategy::DIRECT_RETRY)
            .canonical_path("model5.glb"),
        Some("cdn/models/model5.glb".to_string())
    );
    assert_eq!(
        FallbackResolver::new("", NormalizeStrategy::DIRECT_RETRY).canonical_path("x/model5.glb"),
        Some("model5.glb".to_string())
    );
    assert_eq!(resolver().canonical_path("connector.glb"), None);
}

#[test]
fn should_classify_archetypes_by_substring() {
    assert_eq!(Archetype::classify("connector-v2.glb"), Archetype::Connector);
    assert_eq!(Archetype::classify("products/FiberConnector.glb"), Archetype::Connector);
    assert_eq!(Archetype::classify("patch-cable-3m.glb"), Archetype::Cable);
    assert_eq!(Archetype::classify("cable_connector.glb"), Archetype::Connector);
    assert_eq!(Archetype::classify("enclosure.glb"), Archetype::Generic);
    assert_eq!(Archetype::classify(""), Archetype::Generic);
}

#[tokio::test]
async fn should_try_direct_retry_before_placeholder() {
    let log = event_log();
    let loader = ScriptedLoader::new(&log);

    let recovered = resolver()
        .resolve(&loader, "assets/model007.glb", &unavailable("assets/model007.glb"))
        .await;

    assert_eq!(loader.requests(), vec!["assets/model007.glb"]);
    assert_eq!(recovered.source, ModelSource::Placeholder(Archetype::Generic));
    assert!(recovered.normalization.is_none());
}

#[tokio::test]
async fn should_normalize_successful_direct_retry_to_span_two() {
    let log = event_log();
    let loader = ScriptedLoader::new(&log).serve("assets/model12.glb", connector_asset);

    let recovered = resolver()
        .resolve(&loader, "catalogue/v3/model12.glb", &unavailable("catalogue/v3/model12.glb"))
        .await;

    assert_eq!(
        recovered.source,
        ModelSource::DirectRetry("assets/model12.glb".to_string())
    );
    let normalization = recovered.normalization.expect("retry is normalized");
    assert_close(normalization.scale, 0.5);
    let bounds = recovered.root.bounding_box();
    assert_close(bounds.max_dimension(), 2.0);
    assert_point_close(bounds.center(), [0.0, 0.0, 0.0]);
}

#[tokio::test]
async fn should_use_placeholder_when_retry_is_empty() {
    let log = event_log();
    let loader = ScriptedLoader::new(&log).serve("assets/model9.glb", ParsedAsset::default);

    let recovered = resolver()
        .resolve(&loader, "model9-connector/model9.glb", &LoadError::empty("model9.glb"))
        .await;

    assert_eq!(loader.requests(), vec!["assets/model9.glb"]);
    assert_eq!(recovered.source, ModelSource::Placeholder(Archetype::Connector));
}

#[tokio::test]
async fn should_show_connector_cylinder_without_model_number() {
    let log = event_log();
    let loader = ScriptedLoader::new(&log);

    let recovered = resolver()
        .resolve(&loader, "connector-v2.glb", &unavailable("connector-v2.glb"))
        .await;

    assert!(loader.requests().is_empty());
    assert_eq!(recovered.source, ModelSource::Placeholder(Archetype::Connector));
    let mesh = placeholder_mesh(&recovered.root)
        .as_mesh()
        .expect("placeholder_mesh is a mesh");
    let size = mesh.geometry.bounds().size();
    assert_close(size.x, 1.0);
    assert_close(size.y, 1.5);
    assert_close(size.z, 1.0);
    // a cube would have 24 vertices
    assert!(mesh.geometry.vertices.len() > 24);
    assert_close(mesh.material.metallic, 0.8);
}

#[tokio::test]
async fn should_always_recover_something_displayable() {
    let references = [
        "",
        "/",
        "model.glb",
        "model00000000000000000000001.glb",
        "assets/model1.glb",
        "../../etc/passwd",
        "cable",
        "CONNECTOR.GLTF",
        "http://unreachable.invalid/model77.glb",
        "ü/модель3.glb",
    ];
    for reference in references {
        let log = event_log();
        let loader = ScriptedLoader::new(&log)
            .serve_error("assets/model1.glb", "corrupt buffer")
            .serve("assets/model77.glb", ParsedAsset::default);
        for error in [unavailable(reference), LoadError::empty(reference)] {
            let recovered = resolver().resolve(&loader, reference, &error).await;

            assert!(recovered.root.mesh_count() > 0, "{reference:?} left nothing to show");
            assert!(!recovered.root.bounding_box().is_empty());
        }
    }
}

#[test]
fn should_build_placeholders_without_shadows_and_with_standard_materials() {
    for archetype in [Archetype::Connector, Archetype::Cable, Archetype::Generic] {
        let root = placeholder(archetype);

        assert_eq!(root.name, format!("placeholder_{}", archetype.name()));
        assert!(matches!(root.kind, NodeKind::Group));
        let mesh = placeholder_mesh(&root).as_mesh().expect("mesh node");
        assert!(!mesh.cast_shadow && !mesh.receive_shadow);
        assert!(mesh.material.base_color.is_some());
    }
}

#[test]
fn should_lay_cable_placeholder_along_x() {
    let size = placeholder(Archetype::Cable).bounding_box().size();

    assert_close(size.x, 3.0);
    assert_close(size.y, 0.2);
    assert_close(size.z, 0.2);
}

#[test]
fn should_build_unit_cube_for_generic_products() {
    let bounds = placeholder(Archetype::Generic).bounding_box();

    assert_close(bounds.max_dimension(), 1.0);
    assert_close(bounds.volume(), 1.0);
    assert_point_close(bounds.center(), [0.0, 0.0, 0.0]);
}
