mod support;

use std::sync::Arc;
use std::time::Duration;

use diffview::render::PreformattedRenderer;
use diffview::DiffPipeline;
use diffview_error::ErrorCategory;
use diffview_git::{DiffExecutor, DiffRequest, DiffType, RepositoryLocator};
use diffview_path::{AbsolutePathPolicy, PathResolver};
use diffview_server::{ContentServer, ContentStore};

use support::{http_get, TempRepo};

fn pipeline_for(repo: &TempRepo, store: Arc<ContentStore>) -> DiffPipeline {
    DiffPipeline::new(
        RepositoryLocator::default(),
        DiffExecutor::default(),
        PathResolver::new(repo.path(), AbsolutePathPolicy::Allow),
        Arc::new(PreformattedRenderer),
        store,
    )
}

#[tokio::test]
async fn staged_diff_is_published_and_viewable_over_http() {
    let repo = TempRepo::new("staged-flow");
    repo.write("notes.txt", "one\ntwo\nthree\nfour\n");
    repo.git(&["add", "notes.txt"]);
    repo.git(&["commit", "--quiet", "-m", "add notes"]);

    // Stage a +3/-1 change.
    repo.write("notes.txt", "one\nthree\nfour\nfive\nsix\nseven\n");
    repo.git(&["add", "notes.txt"]);

    let store = Arc::new(ContentStore::new(Duration::from_secs(60)));
    let pipeline = pipeline_for(&repo, Arc::clone(&store));

    let diff = pipeline
        .generate(repo.path(), &DiffRequest::new(DiffType::Staged))
        .await
        .expect("staged diff should generate");

    assert_eq!(diff.diff_type, DiffType::Staged);
    assert_eq!(diff.stats.files_changed, 1);
    assert_eq!(diff.stats.additions, 3);
    assert_eq!(diff.stats.deletions, 1);
    assert_eq!(diff.repository.current_branch, "main");

    let published = pipeline.publish(&diff).await;

    let server = ContentServer::new(Arc::clone(&store), Duration::from_secs(1800));
    let mut running = server
        .start("127.0.0.1:0".parse().expect("loopback addr parses"))
        .await
        .expect("server starts");

    let (status, head, body) = http_get(running.port(), &published.url_path).await;
    assert_eq!(status, 200);
    assert!(head.to_ascii_lowercase().contains("content-type: text/html"));
    assert!(head.to_ascii_lowercase().contains("cache-control: no-cache"));
    assert!(body.contains("staged diff"));
    assert!(body.contains("+five"));

    running.dispose().await;
}

#[tokio::test]
async fn bogus_ref_reports_a_target_error_instead_of_crashing() {
    let repo = TempRepo::new("bogus-ref");
    let store = Arc::new(ContentStore::new(Duration::from_secs(60)));
    let pipeline = pipeline_for(&repo, store);

    let mut request = DiffRequest::new(DiffType::Commit);
    request.target = Some("bogus-ref".to_string());

    let err = pipeline
        .generate(repo.path(), &request)
        .await
        .expect_err("bogus ref must fail");

    assert_eq!(err.category(), ErrorCategory::GitOperation);
    assert!(
        err.code() == "INVALID_TARGET" || err.code() == "AMBIGUOUS_TARGET",
        "unexpected code {}",
        err.code()
    );
}

#[tokio::test]
async fn non_repository_directory_reports_not_a_repository() {
    let plain = TempRepo::plain_dir("not-a-repo");
    let anchor = TempRepo::new("anchor");
    let store = Arc::new(ContentStore::new(Duration::from_secs(60)));
    let pipeline = pipeline_for(&anchor, store);

    let err = pipeline
        .generate(plain.path(), &DiffRequest::new(DiffType::Unstaged))
        .await
        .expect_err("plain directory must fail");

    assert_eq!(err.category(), ErrorCategory::GitOperation);
    assert_eq!(err.code(), "NOT_A_REPOSITORY");
}

#[tokio::test]
async fn branch_diff_against_main_sees_feature_commits() {
    let repo = TempRepo::new("branch-diff");
    repo.git(&["checkout", "--quiet", "-b", "feature/topic"]);
    repo.write("feature.txt", "feature work\n");
    repo.git(&["add", "feature.txt"]);
    repo.git(&["commit", "--quiet", "-m", "feature commit"]);

    let store = Arc::new(ContentStore::new(Duration::from_secs(60)));
    let pipeline = pipeline_for(&repo, Arc::clone(&store));

    let diff = pipeline
        .generate(repo.path(), &DiffRequest::new(DiffType::Branch))
        .await
        .expect("branch diff should generate");

    assert_eq!(diff.stats.files_changed, 1);
    assert_eq!(diff.files[0].path, "feature.txt");
    assert!(diff.raw.contains("+feature work"));
}
