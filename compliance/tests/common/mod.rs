#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chapter::{Block, Document};

pub enum Cell {
    Md(&'static str),
    Code(&'static str),
}

pub use Cell::{Code, Md};

pub const TITLE: Cell = Md(
    "![Visual summary](images/ch01_sampling_visual_summary.png)\n# Chapter 1: Sampling\n\nHow samples describe populations.",
);
pub const TITLE_WITHOUT_IMAGE: Cell = Md("# Chapter 1: Sampling\n\nHow samples describe populations.");

/// A chapter that passes every rule.
pub fn compliant() -> Vec<Cell> {
    vec![
        TITLE,
        Md("## Overview\n\nWhat you will learn."),
        Md("## Setup\n\nInstall the packages below."),
        Code("import numpy as np\nimport pandas as pd"),
        Md("## 1.1 Populations\n\nEveryone you could ask."),
        Md("> **Key Concept:** Populations\n>\n> A population is the full set of units of interest."),
        Md("## 1.2 Samples\n\nThe ones you did ask."),
        Md("> **Key Concept:** Samples\n>\n> A sample is a subset drawn from the population."),
        Md("## 1.3 Bias\n\nWhen the two disagree."),
        Md("> **Key Concept:** Bias\n>\n> Bias is a systematic gap between estimate and truth."),
        Md("## Case Study: Polling\n\nA pre-election survey."),
        Md("### Task 1: Load (Guided)\n\nLoad the poll."),
        Code("poll = pd.read_csv('poll.csv')  # YOUR CODE HERE"),
        Md("### Task 2: Clean (Semi-guided)\n\nDrop incomplete rows."),
        Md("### Task 3: Estimate (Independent)\n\nEstimate support with a confidence interval."),
        Md("## Key Takeaways\n\n- Samples estimate populations."),
        Md("## Practice Exercises\n\n1. Draw a stratified sample."),
        Md("---"),
    ]
}

pub fn document(cells: Vec<Cell>) -> Document {
    Document::new(
        cells
            .into_iter()
            .map(|cell| match cell {
                Md(text) => Block::prose(text),
                Code(text) => Block::executable(text),
            })
            .collect(),
    )
}

/// Save `cells` as `<dir>/<name>.ipynb`.
pub fn write_chapter(dir: &Path, name: &str, cells: Vec<Cell>) -> PathBuf {
    let path = dir.join(format!("{}.ipynb", name));
    document(cells).save(&path).unwrap();
    path
}

/// Every line of `inner`, ignoring terminators, appears in `outer` in order.
pub fn is_subsequence(inner: &Block, outer: &Block) -> bool {
    let mut lines = outer.text_lines();
    inner.text_lines().all(|wanted| lines.any(|line| line == wanted))
}
