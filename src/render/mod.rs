//! HTML rendering
//!
//! Pure functions from jobs and form state to markup. Every interpolated
//! value goes through [`escape_html`].

pub mod assets;

pub use assets::AssetIntegrity;

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::csrf::CSRF_FIELD;
use crate::jobs::{Job, TagMatch};
use crate::models::ResultsPayload;

/// Everything the full page needs besides the results markup.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub query: &'a str,
    pub selected_tags: &'a BTreeSet<String>,
    pub tag_match: TagMatch,
    pub tags: &'a [String],
    pub csrf_token: &'a str,
    pub assets: &'a AssetIntegrity,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_job(job: &Job) -> String {
    format!(
        r#"
<article class="card">
  <h2>{title}</h2>
  <p>{company} &mdash; {location}</p>
  <a class="button primary" href="{url}" rel="noopener noreferrer">Apply</a>
</article>"#,
        title = escape_html(&job.title),
        company = escape_html(&job.company),
        location = escape_html(&job.location),
        url = escape_html(&job.url),
    )
}

/// "1 job", "2 jobs", "0 jobs".
pub fn job_count_label(count: usize) -> String {
    format!("{count} job{}", if count == 1 { "" } else { "s" })
}

/// The results list plus the live `#count` element.
pub fn render_list(jobs: &[&Job]) -> String {
    let items = jobs.iter().fold(String::new(), |mut acc, job| {
        let _ = write!(acc, r#"<li class="col-12 col-6-md col-4-lg">{}</li>"#, render_job(job));
        acc
    });

    format!(
        r#"<ol class="row is-paddingless">
    {items}
  </ol>
  <p id="count" aria-live="polite">{count}</p>
"#,
        count = job_count_label(jobs.len()),
    )
}

/// Payload for a `results` push event.
pub fn render_results(jobs: &[&Job]) -> ResultsPayload {
    ResultsPayload {
        html: render_list(jobs),
        count: jobs.len(),
    }
}

pub fn render_form(ctx: &PageContext<'_>) -> String {
    let tag_items = ctx
        .tags
        .iter()
        .enumerate()
        .fold(String::new(), |mut acc, (idx, tag)| {
            let is_selected = ctx
                .selected_tags
                .iter()
                .any(|s| ctx.tag_match.matches(s, tag));
            let tag = escape_html(tag);
            let checked = if is_selected {
                " checked"
            } else {
                ""
            };
            let _ = write!(
                acc,
                r#"
          <li>
            <label for="tag-{idx}">
              <input name="tag" id="tag-{idx}" type="checkbox"{checked} value="{tag}" />
              {tag}
            </label>
          </li>"#
            );
            acc
        });

    format!(
        r#"
  <form id="search" method="POST" action="/search">
    <fieldset>
      <legend>Search Jobs</legend>
      <label><input name="q" type="search" value="{query}" /> Search in title, location or company name</label>
    </fieldset>
    <fieldset>
      <legend id="tag-group">Filter with Tags</legend>
      <ul class="tag-list" role="group" aria-labelledby="tag-group">{tag_items}
      </ul>
    </fieldset>
    <button class="button primary" type="submit">Search</button>
    <input type="hidden" name="{field}" value="{token}" />
  </form>
"#,
        query = escape_html(ctx.query),
        field = CSRF_FIELD,
        token = escape_html(ctx.csrf_token),
    )
}

fn integrity_attr(hash: Option<&String>) -> String {
    hash.map(|h| format!(r#" integrity="{}""#, escape_html(h)))
        .unwrap_or_default()
}

/// The full document around `content` (normally [`render_list`] output).
pub fn render_page(content: &str, ctx: &PageContext<'_>) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Progressive Enhancement Demo</title>
    <link rel="stylesheet" href="/style.css"{style_integrity}>
  </head>
  <body>
    <div class="container">
      <article>
        <header>
          <h1>Progressively Enhanced Job Board</h1>
        </header>
        <div>
          <p>Search works as a plain form with scripting disabled. With scripting enabled, results update in place as the server pushes them.</p>
        </div>
      </article>
      {form}
      <hr />
      <section id="results">
      {content}
      </section>
    </div>
    <script src="/app.js"{script_integrity}></script>
  </body>
</html>
"#,
        style_integrity = integrity_attr(ctx.assets.stylesheet.as_ref()),
        script_integrity = integrity_attr(ctx.assets.script.as_ref()),
        form = render_form(ctx),
    )
}
