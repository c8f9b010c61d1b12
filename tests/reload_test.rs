use mmd_viewer::{
    Action, ReloadOutcome, ReloadState, ViewerConfig, ViewerError,
    sequencer::{ReloadPlan, Stage},
};

use crate::common::test_utils::TestViewer;

mod common;

#[test]
fn should_load_mesh_poses_and_motions_on_first_mount() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    assert_eq!(t.viewer.reload_state(), ReloadState::Idle);

    t.viewer.mount();
    t.run();

    assert_eq!(t.viewer.reload_state(), ReloadState::Ready);
    assert_eq!(t.viewer.last_outcome(), Some(Ok(ReloadOutcome::Ready)));
    let mesh = t.viewer.attached_mesh().expect("mesh attached");
    assert_eq!(mesh.url, t.model_url("diluc"));

    let probe = t.probe.borrow();
    assert_eq!(probe.scene, vec![mesh.id]);
    assert_eq!(probe.controls_saved, 1);
    // every pose applied to the new mesh
    assert_eq!(probe.poses.len(), 5);
    assert!(probe.poses.iter().all(|(id, _)| *id == mesh.id));
    // registered once, with one clip per catalog motion
    assert_eq!(probe.registered.len(), 1);
    assert_eq!(probe.registered[0].mesh, mesh.id);
    assert!(probe.registered[0].physics);
    assert_eq!(probe.registered[0].clips.len(), 3);
    drop(probe);

    let mut motions = t.viewer.loaded_motions();
    motions.sort();
    assert_eq!(motions, vec!["dance1", "dance2", "dance3"]);
}

#[test]
fn should_run_stages_one_after_another() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingMesh);
    assert_eq!(t.loader.requests(), vec![format!("model {}", t.model_url("diluc"))]);

    let mesh = t.loader.complete_models().expect("mesh loaded");
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingPoses);
    // the mesh is visible while its poses load
    assert_eq!(t.probe.borrow().scene, vec![mesh]);
    assert_eq!(t.loader.pending(), 5);
    assert!(!t.loader.requests().iter().any(|r| r.starts_with("motion")));

    t.loader.complete_poses();
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingMotions);
    assert_eq!(t.probe.borrow().poses.len(), 5);
    let motion_requests: Vec<String> = t
        .loader
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("motion"))
        .collect();
    assert_eq!(motion_requests.len(), 3);
    assert!(motion_requests.iter().all(|r| r.ends_with(&format!(" {}", mesh))));

    t.loader.complete_motions();
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::Ready);
}

#[test]
fn should_keep_previous_mesh_when_model_load_fails() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();
    let diluc = t.viewer.attached_mesh().expect("mesh attached");

    t.loader.fail(&t.model_url("lisa"));
    t.viewer
        .dispatch(Action::ChangeModel("lisa".to_string()))
        .expect("known model");
    t.run();

    assert_eq!(t.viewer.attached_mesh().map(|m| m.id), Some(diluc.id));
    assert_eq!(t.viewer.reload_state(), ReloadState::Ready);
    assert!(matches!(
        t.viewer.last_outcome(),
        Some(Err(ViewerError::StageFailure {
            stage: Stage::Mesh,
            ..
        }))
    ));
    let probe = t.probe.borrow();
    assert_eq!(probe.count(&format!("mesh.dispose_geometry {}", diluc.id)), 0);
    assert_eq!(probe.scene, vec![diluc.id]);
}

#[test]
fn should_fail_when_no_mesh_ever_loaded() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.loader.fail(&t.model_url("diluc"));
    t.viewer.mount();
    t.run();

    assert_eq!(t.viewer.reload_state(), ReloadState::Failed);
    assert!(t.viewer.attached_mesh().is_none());
    assert!(t.probe.borrow().poses.is_empty());
    assert!(!t.loader.requests().iter().any(|r| r.starts_with("pose")));
}

#[test]
fn should_dispose_unfinished_mesh_when_next_model_fails() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    let diluc = t.loader.complete_models().expect("mesh loaded");
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingPoses);

    t.loader.fail(&t.model_url("lisa"));
    t.viewer
        .dispatch(Action::ChangeModel("lisa".to_string()))
        .expect("known model");
    t.run();
    assert_eq!(t.loader.complete_models(), None);
    t.run();

    // the first mesh was never registered, so there is nothing to fall back to
    assert_eq!(t.viewer.reload_state(), ReloadState::Failed);
    assert!(t.viewer.attached_mesh().is_none());
    assert!(matches!(
        t.viewer.last_outcome(),
        Some(Err(ViewerError::StageFailure {
            stage: Stage::Mesh,
            ..
        }))
    ));
    {
        let probe = t.probe.borrow();
        assert!(probe.scene.is_empty());
        assert!(probe.registered.is_empty());
        assert_eq!(probe.count(&format!("scene.remove {}", diluc)), 1);
        assert_eq!(probe.count(&format!("mesh.dispose_geometry {}", diluc)), 1);
        assert_eq!(probe.count(&format!("mesh.dispose_skeleton {}", diluc)), 1);
    }

    // poses of the superseded reload still drain without touching anything
    t.loader.complete_poses();
    t.run();
    assert!(t.probe.borrow().poses.is_empty());
    assert_eq!(t.viewer.reload_state(), ReloadState::Failed);
    assert_eq!(t.loader.pending(), 0);
}

#[test]
fn should_continue_when_poses_or_motions_fail() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    let config = t.viewer.config().clone();
    t.loader.fail(&config.catalog.poses[2]);
    t.loader.fail(&t.motion_url("dance2"));
    t.viewer.mount();
    t.run();

    assert_eq!(t.viewer.reload_state(), ReloadState::Ready);
    assert_eq!(t.probe.borrow().poses.len(), 4);
    let mut motions = t.viewer.loaded_motions();
    motions.sort();
    assert_eq!(motions, vec!["dance1", "dance3"]);
}

#[test]
fn should_not_pose_a_superseded_mesh() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    let diluc = t.loader.complete_models().expect("mesh loaded");
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingPoses);

    t.viewer
        .dispatch(Action::ChangeModel("lisa".to_string()))
        .expect("known model");
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingMesh);

    // poses of the first reload arrive after it was superseded
    t.loader.complete_poses();
    t.run();
    assert!(t.probe.borrow().poses.is_empty());

    let lisa = t.loader.complete_models().expect("mesh loaded");
    t.run();
    t.loader.complete_poses();
    t.run();
    t.loader.complete_motions();
    t.run();

    assert_eq!(t.viewer.reload_state(), ReloadState::Ready);
    assert_eq!(t.viewer.last_outcome(), Some(Ok(ReloadOutcome::Ready)));
    let probe = t.probe.borrow();
    assert_eq!(probe.poses.len(), 5);
    assert!(probe.poses.iter().all(|(id, _)| *id == lisa));
    assert_eq!(probe.count(&format!("mesh.dispose_geometry {}", diluc)), 1);
    assert_eq!(probe.scene, vec![lisa]);
    assert_eq!(probe.registered.len(), 1);
    assert_eq!(probe.registered[0].mesh, lisa);
}

#[test]
fn should_dispose_mesh_that_arrives_after_being_superseded() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    t.viewer
        .dispatch(Action::ChangeModel("miku".to_string()))
        .expect("known model");
    t.run();
    assert_eq!(t.loader.pending(), 2);

    // both models complete; only the newest may be attached
    t.loader.complete_models();
    t.run();

    let probe = t.probe.borrow();
    assert_eq!(probe.scene, vec![2]);
    assert_eq!(probe.count("scene.add 1"), 0);
    assert_eq!(probe.count("mesh.dispose_geometry 1"), 1);
    assert_eq!(probe.count("mesh.dispose_skeleton 1"), 1);
    drop(probe);
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingPoses);
}

#[test]
fn should_replace_mesh_on_model_change() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();
    let first = t.viewer.attached_mesh().expect("mesh attached");

    let generation = t.viewer.reload_model();
    t.run();
    let second = t.viewer.attached_mesh().expect("mesh attached");
    assert_ne!(first.id, second.id);
    assert!(generation > 1);

    let probe = t.probe.borrow();
    let removed = probe
        .position(&format!("helper.remove {}", first.id))
        .expect("unregistered");
    let added = probe
        .position(&format!("scene.add {}", second.id))
        .expect("attached");
    assert!(removed < added);
    assert_eq!(probe.scene, vec![second.id]);
    assert_eq!(probe.registered.len(), 1);
}

#[test]
fn should_ignore_selecting_the_current_model() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();
    let requests = t.loader.requests().len();

    t.viewer
        .dispatch(Action::ChangeModel("diluc".to_string()))
        .expect("known model");
    t.run();
    assert_eq!(t.loader.requests().len(), requests);

    let err = t
        .viewer
        .dispatch(Action::ChangeModel("nobody".to_string()))
        .unwrap_err();
    assert!(matches!(err, ViewerError::UnknownAsset { kind: "model", .. }));
    assert_eq!(t.viewer.selection().model(), "diluc");
}

#[test]
fn should_dispose_model_once() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();
    let mesh = t.viewer.attached_mesh().expect("mesh attached").id;

    assert!(t.viewer.dispose_model());
    assert!(!t.viewer.dispose_model());
    assert_eq!(t.viewer.reload_state(), ReloadState::Idle);
    assert!(t.viewer.loaded_motions().is_empty());

    let probe = t.probe.borrow();
    let order: Vec<&str> = probe
        .log
        .iter()
        .map(String::as_str)
        .skip_while(|e| *e != format!("helper.remove {}", mesh))
        .collect();
    assert_eq!(
        order,
        vec![
            format!("helper.remove {}", mesh),
            format!("scene.remove {}", mesh),
            format!("mesh.dispose_geometry {}", mesh),
            format!("mesh.dispose_materials {}", mesh),
            format!("mesh.dispose_skeleton {}", mesh),
        ]
    );
    assert!(probe.scene.is_empty());
    assert!(probe.registered.is_empty());
}

#[test]
fn should_stop_reload_when_model_is_disposed() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    assert!(!t.viewer.dispose_model());

    t.loader.complete_models();
    t.run();

    assert_eq!(t.viewer.reload_state(), ReloadState::Idle);
    assert!(t.viewer.attached_mesh().is_none());
    assert_eq!(t.probe.borrow().count("mesh.dispose_geometry 1"), 1);
    assert_eq!(t.viewer.last_outcome(), None);
}

#[test]
fn should_play_selected_motion_once() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();
    let mesh = t.viewer.attached_mesh().expect("mesh attached").id;

    t.viewer
        .dispatch(Action::ChangeMotion("dance2".to_string()))
        .expect("known motion");

    let probe = t.probe.borrow();
    let tail: Vec<&String> = probe.log.iter().rev().take(5).rev().collect();
    assert_eq!(
        tail,
        vec![
            &format!("mesh.rest_pose {}", mesh),
            &format!("mixer.stop_all_action {}", mesh),
            &"action.set_loop Once 0".to_string(),
            &"action.reset".to_string(),
            &format!("action.play {}", t.motion_url("dance2")),
        ]
    );
    drop(probe);
    assert_eq!(t.viewer.selection().motion(), "dance2");
}

#[test]
fn should_report_unregistered_resources() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    assert!(matches!(
        t.viewer.play_motion(),
        Err(ViewerError::ResourceNotRegistered(_))
    ));
    assert!(matches!(
        t.viewer.reset_pose(),
        Err(ViewerError::ResourceNotRegistered(_))
    ));

    t.viewer.mount();
    t.run();
    t.loader.complete_models();
    t.run();
    // attached but not registered with the helper yet
    assert!(matches!(
        t.viewer.play_motion(),
        Err(ViewerError::ResourceNotRegistered(_))
    ));
    // selecting a motion early is fine, it plays once ready
    t.viewer
        .dispatch(Action::ChangeMotion("dance3".to_string()))
        .expect("known motion");
    assert_eq!(t.viewer.selection().motion(), "dance3");
}

#[test]
fn should_register_mesh_on_reset_pose() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    let mesh = t.loader.complete_models().expect("mesh loaded");
    t.run();
    t.loader.complete_poses();
    t.run();
    assert_eq!(t.viewer.reload_state(), ReloadState::LoadingMotions);

    t.viewer.dispatch(Action::ResetPose).expect("mesh attached");
    {
        let probe = t.probe.borrow();
        assert_eq!(probe.registered.len(), 1);
        assert_eq!(probe.count(&format!("mixer.set_time {} 0", mesh)), 1);
    }

    t.loader.complete_motions();
    t.run();
    let probe = t.probe.borrow();
    assert_eq!(probe.registered.len(), 1);
    assert_eq!(probe.registered[0].clips.len(), 3);
}

#[test]
fn should_assign_shared_motion_files_to_each_name() {
    let mut t = TestViewer::new(ViewerConfig::default(), true);
    t.viewer.mount();
    t.run();

    // dance1 and dance3 share a file
    assert_eq!(t.motion_url("dance1"), t.motion_url("dance3"));
    t.viewer.play_motion().expect("dance1 registered");
    t.viewer
        .dispatch(Action::ChangeMotion("dance3".to_string()))
        .expect("dance3 registered");
    let plays = t.probe.borrow().count(&format!("action.play {}", t.motion_url("dance1")));
    assert_eq!(plays, 2);
}

#[test]
fn should_match_clips_to_unclaimed_motion_names() {
    let config = ViewerConfig::default();
    let plan = ReloadPlan::for_model(&config, "diluc").expect("known model");
    let shared = config.catalog.motion("dance1").expect("known motion").url.clone();

    let mut claimed: Vec<(String, ())> = Vec::new();
    assert_eq!(plan.unclaimed_motion(&shared, &claimed), Some("dance1"));
    claimed.push(("dance1".to_string(), ()));
    assert_eq!(plan.unclaimed_motion(&shared, &claimed), Some("dance3"));
    claimed.push(("dance3".to_string(), ()));
    assert_eq!(plan.unclaimed_motion(&shared, &claimed), None);
    assert_eq!(plan.unclaimed_motion("./missing.vmd", &[] as &[(String, ())]), None);
}

#[test]
fn should_reset_camera() {
    let mut t = TestViewer::new(ViewerConfig::default(), false);
    t.viewer.mount();
    t.run();
    t.viewer.dispatch(Action::ResetCamera).expect("always succeeds");
    assert_eq!(t.probe.borrow().controls_resets, 1);
}

#[test]
fn should_parse_actions() {
    assert_eq!("refresh".parse::<Action>().ok(), Some(Action::Refresh));
    assert_eq!(
        "change-model:lisa".parse::<Action>().ok(),
        Some(Action::ChangeModel("lisa".to_string()))
    );
    assert_eq!(
        "change-motion:dance2".parse::<Action>().ok(),
        Some(Action::ChangeMotion("dance2".to_string()))
    );
    assert!("change-model".parse::<Action>().is_err());
    assert!("jump".parse::<Action>().is_err());
}
