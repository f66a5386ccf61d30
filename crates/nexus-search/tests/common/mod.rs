#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use nexus_core::config::NexusConfig;
use nexus_core::model::Candidate;
use nexus_search::backend::{HashingEmbedder, MemoryIndex};
use nexus_search::{CoherenceJudge, LexicalHit, LexicalSearch, Pipeline, VectorHit, VectorSearch};
use std::sync::Arc;
use std::time::Duration;

/// The eight-patent corpus: "2" and "6" are about cryptography, "4" is not.
pub fn patents() -> Vec<Candidate> {
    vec![
        Candidate::new(
            "1",
            "Method and System for Neural Network Based Image Recognition",
            "A system and method for image recognition using convolutional neural networks. \
             The invention provides improved accuracy through a novel layer architecture and \
             training methodology that reduces overfitting.",
        ),
        Candidate::new(
            "2",
            "Distributed Ledger System for Patent Verification",
            "A blockchain-based system for verifying patent submissions and detecting prior art. \
             The system utilizes cryptographic proofs to timestamp inventions and maintain an \
             immutable record of claims.",
        ),
        Candidate::new(
            "3",
            "Quantum Computing Method for Pharmaceutical Discovery",
            "A quantum computing method for simulating molecular interactions to accelerate drug \
             discovery. The system leverages quantum superposition to evaluate multiple potential \
             compounds simultaneously.",
        ),
        Candidate::new(
            "4",
            "Autonomous Vehicle Navigation System",
            "A system for autonomous vehicle navigation using sensor fusion and reinforcement \
             learning. The invention improves safety through redundant perception systems and \
             novel decision-making algorithms.",
        ),
        Candidate::new(
            "5",
            "Enhanced Natural Language Processing Using Transfer Learning",
            "A method for improving natural language processing accuracy through transfer \
             learning from large pre-trained language models. The technique enables better \
             performance with smaller task-specific datasets.",
        ),
        Candidate::new(
            "6",
            "Zero-Knowledge Proof System for Identity Verification",
            "A cryptographic system enabling identity verification without revealing personal \
             data. The zero-knowledge protocol allows proving possession of credentials without \
             transmitting the credentials themselves.",
        ),
        Candidate::new(
            "7",
            "Deep Reinforcement Learning System for Resource Optimization",
            "A deep reinforcement learning approach to optimize resource allocation in \
             distributed systems. The method continuously adapts to changing conditions to \
             maximize efficiency.",
        ),
        Candidate::new(
            "8",
            "Neural Interface for Computer-Brain Interaction",
            "A non-invasive neural interface system enabling direct communication between \
             computers and human neural activity. The system interprets signals for both input \
             and output functionality.",
        ),
    ]
}

pub fn index() -> Arc<MemoryIndex> {
    Arc::new(MemoryIndex::new(patents()).with_embeddings(&HashingEmbedder::default()))
}

pub fn pipeline() -> Pipeline {
    pipeline_with(NexusConfig::default())
}

pub fn pipeline_with(config: NexusConfig) -> Pipeline {
    Pipeline::builder(config)
        .index(index())
        .build()
        .expect("pipeline")
}

/// A judge that answers long after any reasonable timeout.
pub struct StalledJudge;

#[async_trait]
impl CoherenceJudge for StalledJudge {
    async fn score(&self, _query: &str, _candidate_text: &str) -> Result<f32> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(10.0)
    }
}

/// A backend whose every call fails.
pub struct Offline;

#[async_trait]
impl VectorSearch for Offline {
    async fn search(&self, _: &[f32], _: f32, _: usize) -> Result<Vec<VectorHit>> {
        bail!("vector index offline")
    }
}

#[async_trait]
impl LexicalSearch for Offline {
    async fn search(&self, _: &str, _: usize) -> Result<Vec<LexicalHit>> {
        bail!("full-text index offline")
    }
}
