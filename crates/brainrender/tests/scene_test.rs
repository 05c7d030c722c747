//! End-to-end scene tests on the toy atlas.
//!
//! Settings are process-wide, so every test goes through `setup()`, which
//! switches to a small offscreen window and writes the toy atlas once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use brainrender::*;
use brainrender_actors::format_significant;
use proptest::prelude::*;
use rand::{Rng, SeedableRng};

fn setup() -> &'static PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        update_settings(|s| {
            s.offscreen = true;
            s.interactive = false;
            s.window_size = [160, 100];
        });
        let dir = std::env::temp_dir().join(format!("brainrender-scene-test-{}", std::process::id()));
        write_toy_atlas(&Paths::new(&dir), TOY_ATLAS).expect("write toy atlas");
        dir
    })
}

fn toy_scene() -> Scene {
    let base = setup();
    Scene::new(SceneOptions {
        atlas_name: Some(TOY_ATLAS.to_string()),
        base_dir: Some(base.clone()),
        ..SceneOptions::default()
    })
    .expect("toy scene")
}

fn contains(outer: (Vec3, Vec3), inner: (Vec3, Vec3), tol: f32) -> bool {
    (inner.0 - outer.0).min_element() >= -tol && (outer.1 - inner.1).min_element() >= -tol
}

fn overlaps(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> bool {
    a.0.cmple(b.1).all() && b.0.cmple(a.1).all()
}

/// Uniform samples inside an axis-aligned ellipsoid.
fn inside_ellipsoid(center: Vec3, semi: Vec3, n: usize, seed: u64) -> Vec<Vec3> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let d = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        if d.length_squared() <= 0.8 {
            out.push(center + d * semi);
        }
    }
    out
}

#[test]
fn test_single_region_screenshot() {
    let mut scene = toy_scene();
    let ids = scene.add_brain_region(&["TH"], &RegionOptions::default()).expect("TH");
    assert_eq!(ids.len(), 1);

    let names: Vec<&str> = scene.actors().iter().map(Actor::name).collect();
    assert_eq!(names, vec![ROOT, "TH"]);
    let root = scene.root().and_then(Actor::bounds).expect("root bounds");
    let th = scene.actor(ids[0]).and_then(Actor::bounds).expect("TH bounds");
    assert!(contains(root, th, 1.0));

    scene.render(&RenderOptions::offscreen()).expect("render");
    assert!(scene.is_rendered());
    let path = scene.screenshot(Some("single_region"), None).expect("screenshot");
    let size = std::fs::metadata(&path).expect("screenshot file").len();
    assert!(size > 0);
    assert!(path.starts_with(scene.screenshots_folder()));
}

#[test]
fn test_screenshot_renders_first() {
    let mut scene = toy_scene();
    scene.add_brain_region(&["CB"], &RegionOptions::default()).expect("CB");
    assert!(!scene.is_rendered());

    let err = scene.screenshot(Some("figure.xyz"), None).expect_err("unknown format");
    assert!(matches!(err, BrainrenderError::UnsupportedFormat(_)));
    assert!(!scene.is_rendered());
    assert!(scene.actors().iter().all(|a| !a.is_transformed()));

    scene.screenshot(Some("first"), None).expect("screenshot");
    assert!(scene.is_rendered());
    assert!(scene.actors().iter().all(Actor::is_transformed));
    let before: Vec<Vec<Vec3>> = scene.actors().iter().map(|a| a.points().to_vec()).collect();
    scene.screenshot(Some("second"), None).expect("second screenshot");
    let after: Vec<Vec<Vec3>> = scene.actors().iter().map(|a| a.points().to_vec()).collect();
    assert_eq!(before, after);
}

#[test]
fn test_screenshot_vector_formats() {
    let mut scene = toy_scene();
    scene.add_brain_region(&["MB"], &RegionOptions::default()).expect("MB");
    for (name, magic) in [("figure.svg", "<?xml"), ("figure.pdf", "%PDF"), ("figure.eps", "%!PS-Adobe")] {
        let path = scene.screenshot(Some(name), None).expect(name);
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(name));
        let bytes = std::fs::read(&path).expect("screenshot file");
        assert!(bytes.starts_with(magic.as_bytes()), "{name} starts with {magic}");
    }
}

#[test]
fn test_hemisphere_keeps_one_half() {
    let mut scene = toy_scene();
    let midline = scene.atlas().metadata().midline().z;
    let whole = scene.add_brain_region(&["TH"], &RegionOptions::default()).expect("TH")[0];
    let right = RegionOptions {
        hemisphere: Some(Hemisphere::Right),
        ..RegionOptions::default()
    };
    let left = RegionOptions {
        hemisphere: Some(Hemisphere::Left),
        ..RegionOptions::default()
    };
    let right = scene.add_brain_region(&["TH"], &right).expect("right TH")[0];
    let left = scene.add_brain_region(&["TH"], &left).expect("left TH")[0];

    // toy atlas is "asr": the right hemisphere is the low-z half
    let points = |id| scene.actor(id).expect("actor").points().to_vec();
    let (whole, right, left) = (points(whole), points(right), points(left));
    assert!(!right.is_empty() && !left.is_empty());
    assert!(right.iter().all(|p| p.z <= midline + 1.0));
    assert!(left.iter().all(|p| p.z >= midline - 1.0));
    assert!(whole.iter().any(|p| p.z > midline + 1.0) && whole.iter().any(|p| p.z < midline - 1.0));
}

#[test]
fn test_meshless_region_is_skipped() {
    setup();
    let dir = std::env::temp_dir().join(format!("brainrender-scene-meshless-{}", std::process::id()));
    let paths = Paths::new(&dir);
    write_toy_atlas(&paths, TOY_ATLAS).expect("write toy atlas");
    std::fs::write(paths.mesh_file(TOY_ATLAS, "TH").expect("mesh path"), "").expect("truncate TH");
    let mut scene = Scene::new(SceneOptions {
        atlas_name: Some(TOY_ATLAS.to_string()),
        base_dir: Some(dir.clone()),
        ..SceneOptions::default()
    })
    .expect("scene");

    let ids = scene
        .add_brain_region(&["TH", "MOs"], &RegionOptions::default())
        .expect("other regions still added");
    assert_eq!(ids.len(), 1);
    let names: Vec<&str> = scene.actors().iter().map(Actor::name).collect();
    assert_eq!(names, vec![ROOT, "MOs"]);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_density_overlay() {
    let mut scene = toy_scene();
    let mos = scene.add_brain_region(&["MOs"], &RegionOptions::default()).expect("MOs")[0];
    let cells = inside_ellipsoid(Vec3::new(5000.0, 1800.0, 5700.0), Vec3::new(2200.0, 700.0, 2600.0), 400, 7);
    scene
        .add(points(cells.clone(), &PointsOptions::default()).expect("points"))
        .expect("add points");
    let density = scene
        .add(points_density(&cells, &DensityOptions::default()).expect("density"))
        .expect("add density");

    assert_eq!(scene.actors().len(), 4);
    let density = scene.actor(density).expect("density actor");
    assert_eq!(density.br_class(), BrClass::Density);
    assert!(density.volume().expect("density grid").max() > 0.0);
    let mos_bounds = scene.actor(mos).and_then(Actor::bounds).expect("MOs bounds");
    assert!(overlaps(density.bounds().expect("density bounds"), mos_bounds));

    scene.render(&RenderOptions::offscreen()).expect("render");
}

#[test]
fn test_ruler_between_regions() {
    let mut scene = toy_scene();
    let th = scene.atlas_mut().get_region_center_of_mass("TH").expect("TH centre");
    let mos = scene.atlas_mut().get_region_center_of_mass("MOs").expect("MOs centre");
    let options = RulerOptions {
        unit_scale: 0.01,
        units: Some("mm".to_string()),
        ..RulerOptions::default()
    };
    let id = scene.add(ruler(th, mos, &options).expect("ruler")).expect("add ruler");

    let expected = format!("{} mm", format_significant(f64::from(th.distance(mos)) * f64::from(0.01_f32), 3));
    assert_eq!(scene.actor(id).and_then(Actor::text), Some(expected.as_str()));

    let same = ruler(th, th, &options).expect("zero length ruler");
    assert_eq!(same.text(), Some("0 mm"));
}

#[test]
fn test_sagittal_slice_keeps_one_side() {
    let mut scene = toy_scene();
    let ids = scene
        .add_brain_region(&["STR", "TH"], &RegionOptions::default())
        .expect("regions");
    let root_before = scene.root().map(|r| r.mesh().num_vertices()).expect("root");
    let midline = scene.atlas_mut().root_mesh().expect("root mesh").center_of_mass().z;

    scene.slice("sagittal", None, true).expect("slice");
    for id in &ids {
        let actor = scene.actor(*id).expect("region");
        assert!(!actor.mesh().is_empty());
        assert!(actor.points().iter().all(|p| p.z >= midline - 1.0), "{} not cut", actor.name());
    }
    let root = scene.root().expect("root");
    assert_ne!(root.mesh().num_vertices(), root_before);
    assert!(root.points().iter().all(|p| p.z >= midline - 1.0));

    scene.render(&RenderOptions::offscreen()).expect("render");
}

#[test]
fn test_slicing_twice_is_idempotent() {
    let mut scene = toy_scene();
    scene.add_brain_region(&["CB"], &RegionOptions::default()).expect("CB");
    scene.slice("frontal", None, true).expect("first cut");
    let counts: Vec<usize> = scene.actors().iter().map(|a| a.mesh().num_vertices()).collect();
    scene.slice("frontal", None, true).expect("second cut");
    let again: Vec<usize> = scene.actors().iter().map(|a| a.mesh().num_vertices()).collect();
    assert_eq!(counts, again);
}

#[test]
fn test_heatmap_projections() {
    let values: BTreeMap<String, f32> = [("TH", 1.0), ("MOs", 0.2), ("CA1", -0.5)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let mut heatmap = Heatmap::new(toy_scene(), values, &HeatmapOptions::default()).expect("heatmap");

    let regions = heatmap.scene().get_actors(None, Some(BrClass::BrainRegion));
    assert_eq!(regions.len(), 4);
    assert_eq!(heatmap.range(), (-0.5, 1.0));

    let projections = heatmap.slice_coordinates();
    let keys: Vec<&str> = projections.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["CA1", "MOs", "TH"]);
    for (acronym, outline) in projections {
        assert!(outline.len() >= 3, "{acronym} outline has {} points", outline.len());
    }

    let (front, back) = heatmap.planes();
    assert!(((front.origin() - back.origin()).length() - 10.0).abs() < 1e-3);
    heatmap.show(Some(false)).expect("show");
}

#[test]
fn test_single_region_heatmap() {
    let values = BTreeMap::from([("TH".to_string(), 3.0)]);
    let options = HeatmapOptions {
        orientation: "sagittal".into(),
        ..HeatmapOptions::default()
    };
    let heatmap = Heatmap::new(toy_scene(), values, &options).expect("heatmap");
    assert_eq!(heatmap.slice_coordinates().len(), 1);
    assert_eq!(heatmap.range(), (3.0, 3.0));

    let unknown = BTreeMap::from([("nope".to_string(), 1.0)]);
    assert!(Heatmap::new(toy_scene(), unknown, &HeatmapOptions::default()).is_err());
}

#[test]
fn test_render_corrects_every_actor_once() {
    let mut scene = toy_scene();
    scene.add_brain_region(&["HY", "MB"], &RegionOptions::default()).expect("regions");
    scene.render(&RenderOptions::offscreen()).expect("first render");
    assert!(scene.actors().iter().all(Actor::is_transformed));

    let before: Vec<Vec<Vec3>> = scene.actors().iter().map(|a| a.points().to_vec()).collect();
    scene.render(&RenderOptions::offscreen()).expect("second render");
    let after: Vec<Vec<Vec3>> = scene.actors().iter().map(|a| a.points().to_vec()).collect();
    assert_eq!(before, after);
}

#[test]
fn test_labels_and_removal() {
    let mut scene = toy_scene();
    let th = scene.add_brain_region(&["TH"], &RegionOptions::default()).expect("TH")[0];
    scene.add_label(th, "thalamus", LabelParams::default()).expect("label");
    scene.add_silhouette(th, SilhouetteParams::default()).expect("silhouette");
    scene.render(&RenderOptions::offscreen()).expect("render");
    assert!(!scene.get_actors(None, Some(BrClass::Label)).is_empty());
    assert_eq!(scene.get_actors(None, Some(BrClass::Silhouette)).len(), 1);

    let removed = scene.remove(th);
    assert!(removed.len() >= 3);
    assert!(scene.get_actors(None, Some(BrClass::Label)).is_empty());
    assert!(scene.get_actors(None, Some(BrClass::Silhouette)).is_empty());
    assert!(scene.remove("not there").is_empty());
}

#[test]
fn test_add_rejects_unknown_files() {
    let mut scene = toy_scene();
    let before = scene.actors().len();
    let items = vec![
        Addable::from(vec![Vec3::new(6600.0, 4000.0, 5700.0)]),
        Addable::from(PathBuf::from("cells.xyz")),
    ];
    let err = scene.add_many(items).expect_err("unsupported file");
    assert!(matches!(err, BrainrenderError::UnsupportedFormat(_)));
    assert_eq!(scene.actors().len(), before);
}

#[test]
fn test_export_html() {
    let mut scene = toy_scene();
    scene.add_brain_region(&["CB"], &RegionOptions::default()).expect("CB");
    let dir = setup().join("exports");
    let path = scene.export(dir.join("scene.html")).expect("export");
    let html = std::fs::read_to_string(path).expect("html file");
    assert!(html.contains("\"name\":\"CB\""));

    let err = scene.export(dir.join("scene.png")).expect_err("not html");
    assert!(matches!(err, BrainrenderError::InvalidInput(_)));
}

#[test]
fn test_keyboard_shortcuts() {
    let mut scene = toy_scene();
    scene.render(&RenderOptions::offscreen()).expect("render");
    assert!(scene.handle_key('c').expect("camera"));
    assert!(!scene.handle_key('x').expect("unknown key"));
    assert!(scene.handle_key('q').expect("close"));
    assert!(!scene.is_rendered());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn add_then_remove_restores_actors(x in 2_000.0f32..11_000.0, y in 1_500.0f32..6_500.0, z in 1_500.0f32..10_000.0) {
        let mut scene = toy_scene();
        let before: Vec<ActorId> = scene.actors().iter().map(Actor::id).collect();
        let id = scene.add(vec![Vec3::new(x, y, z)]).expect("add point");
        prop_assert_eq!(scene.actors().len(), before.len() + 1);
        let removed = scene.remove(id);
        prop_assert_eq!(removed.len(), 1);
        let after: Vec<ActorId> = scene.actors().iter().map(Actor::id).collect();
        prop_assert_eq!(before, after);
    }
}
