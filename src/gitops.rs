//! Argo CD `ApplicationSet` manifests, one per repository stage.

use minijinja::{Environment, context};

use crate::config::{GiteaConfig, Repository, Stage};
use crate::error::ReconcileError;

/// Argo CD expands its own `{{ ... }}` placeholders at sync time; those are
/// kept verbatim inside `raw` blocks.
const APPSET_TEMPLATE: &str = r"apiVersion: argoproj.io/v1alpha1
kind: ApplicationSet
metadata:
  name: platform-{{ stage }}
spec:
  generators:
    - git:
        repoURL: {{ repo_url }}
        revision: main
        files:
          - path: {{ stage }}/**/config.yaml
  template:
    metadata:
      name: {% raw %}'{{path.basename}}'{% endraw %}
    spec:
      project: {{ argo_project }}
      sources:
        - repoURL: {% raw %}'{{repoURL}}'{% endraw %}
          targetRevision: {% raw %}'{{targetRevision}}'{% endraw %}
          chart: {% raw %}'{{chart}}'{% endraw %}
          helm:
            valueFiles:
              - $values/{{ stage }}/{% raw %}{{path.basename}}{% endraw %}/values.yaml
        - repoURL: {{ repo_url }}
          targetRevision: main
          path: {{ stage }}/{% raw %}{{path.basename}}{% endraw %}
        - repoURL: {{ repo_url }}
          targetRevision: main
          ref: values
      destination:
        name: {{ argo_cluster }}
        namespace: {% raw %}'{{path.basename}}'{% endraw %}
      syncPolicy:
        automated:
          selfHeal: true
        syncOptions:
          - CreateNamespace=true
          - ServerSideApply={% raw %}'{{serverSideApply}}'{% endraw %}
";

/// Path of the stage manifest inside the repository.
pub fn manifest_path(stage: &Stage) -> String {
    format!("{}/appset.yaml", stage.name)
}

pub fn render_appset(
    gitea: &GiteaConfig,
    repo: &Repository,
    stage: &Stage,
) -> Result<String, ReconcileError> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("appset", APPSET_TEMPLATE)
        .map_err(|e| ReconcileError::Render(e.to_string()))?;

    let tmpl = env
        .get_template("appset")
        .map_err(|e| ReconcileError::Render(e.to_string()))?;

    tmpl.render(context! {
        stage => stage.name,
        repo_url => gitea.clone_url(&repo.organization, &repo.name),
        argo_project => stage.argo_project,
        argo_cluster => stage.argo_cluster,
    })
    .map_err(|e| ReconcileError::Render(e.to_string()))
}
