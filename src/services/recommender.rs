//! Collaborative filtering over the user × game interaction matrix.
//!
//! Training factorises the dense matrix with a truncated SVD; users absent
//! from the model, or short on candidates, fall back to global popularity.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use nalgebra::{DMatrix, linalg::SVD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{Millis, now_millis};

#[derive(Debug, Error, PartialEq)]
pub enum TrainingError {
    #[error("need at least {required} interactions to train, found {found}")]
    NotEnoughInteractions { required: usize, found: usize },
    #[error("need at least two users and two games, found {users} user(s) and {games} game(s)")]
    MatrixTooSmall { users: usize, games: usize },
    #[error("singular value decomposition did not converge")]
    Decomposition,
}

/// Where a recommended score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Collaborative,
    Popularity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGame {
    pub game_id: Uuid,
    pub score: f64,
    pub source: ScoreSource,
}

/// One `(user, game, score)` cell of the training matrix.
#[derive(Debug, Clone, Copy)]
pub struct Signal {
    pub user_id: Uuid,
    pub game_id: Uuid,
    pub score: f64,
}

/// Factorised model kept in memory and optionally persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub users: Vec<Uuid>,
    pub games: Vec<Uuid>,
    /// `U·Σ`, one row per user.
    pub user_factors: DMatrix<f64>,
    /// `V`, one row per game.
    pub item_factors: DMatrix<f64>,
    /// Games ordered by total interaction score, highest first.
    pub popularity: Vec<(Uuid, f64)>,
    pub n_components: usize,
    pub interactions: usize,
    pub trained_at: Millis,
}

impl TrainedModel {
    /// Train on positive interaction scores; non-positive cells are ignored.
    pub fn train(
        signals: &[Signal],
        n_components: usize,
        min_interactions: usize,
    ) -> Result<Self, TrainingError> {
        let positive: Vec<&Signal> = signals.iter().filter(|s| s.score > 0.0).collect();
        let required = min_interactions.max(2);
        if positive.len() < required {
            return Err(TrainingError::NotEnoughInteractions {
                required,
                found: positive.len(),
            });
        }

        let mut users: Vec<Uuid> = positive.iter().map(|s| s.user_id).collect();
        users.sort_unstable();
        users.dedup();
        let mut games: Vec<Uuid> = positive.iter().map(|s| s.game_id).collect();
        games.sort_unstable();
        games.dedup();

        let min_dim = users.len().min(games.len());
        if min_dim < 2 {
            return Err(TrainingError::MatrixTooSmall {
                users: users.len(),
                games: games.len(),
            });
        }

        let user_index: HashMap<Uuid, usize> =
            users.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let game_index: HashMap<Uuid, usize> =
            games.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut matrix = DMatrix::<f64>::zeros(users.len(), games.len());
        let mut totals: HashMap<Uuid, f64> = HashMap::new();
        for signal in &positive {
            matrix[(user_index[&signal.user_id], game_index[&signal.game_id])] += signal.score;
            *totals.entry(signal.game_id).or_default() += signal.score;
        }

        let k = n_components.min(min_dim - 1).max(2).min(min_dim);
        let svd = SVD::try_new(matrix, true, true, f64::EPSILON, 0)
            .ok_or(TrainingError::Decomposition)?;
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(TrainingError::Decomposition);
        };

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|a, b| svd.singular_values[*b].total_cmp(&svd.singular_values[*a]));
        order.truncate(k);

        let mut user_factors = DMatrix::<f64>::zeros(users.len(), k);
        let mut item_factors = DMatrix::<f64>::zeros(games.len(), k);
        for (col, component) in order.iter().enumerate() {
            let sigma = svd.singular_values[*component];
            for row in 0..users.len() {
                user_factors[(row, col)] = u[(row, *component)] * sigma;
            }
            for row in 0..games.len() {
                item_factors[(row, col)] = v_t[(*component, row)];
            }
        }

        let mut popularity: Vec<(Uuid, f64)> = totals.into_iter().collect();
        popularity.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            users,
            games,
            user_factors,
            item_factors,
            popularity,
            n_components: k,
            interactions: positive.len(),
            trained_at: now_millis(),
        })
    }

    /// Rank unseen games for `user_id`, topping up from popularity.
    pub fn recommend(&self, user_id: Uuid, exclude: &HashSet<Uuid>, limit: usize) -> Vec<ScoredGame> {
        let mut picked: Vec<ScoredGame> = Vec::with_capacity(limit);
        if limit == 0 {
            return picked;
        }

        if let Some(user_row) = self.users.iter().position(|id| *id == user_id) {
            let user_vector = self.user_factors.row(user_row);
            let mut scored: Vec<ScoredGame> = self
                .games
                .iter()
                .enumerate()
                .filter(|(_, game_id)| !exclude.contains(game_id))
                .map(|(row, game_id)| ScoredGame {
                    game_id: *game_id,
                    score: user_vector.dot(&self.item_factors.row(row)).max(0.0),
                    source: ScoreSource::Collaborative,
                })
                .collect();
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            picked.extend(scored.into_iter().take(limit));
        }

        if picked.len() < limit {
            let top = self.popularity.first().map_or(1.0, |(_, score)| score.max(1.0));
            let chosen: HashSet<Uuid> = picked.iter().map(|game| game.game_id).collect();
            let fill = self
                .popularity
                .iter()
                .filter(|(game_id, _)| !exclude.contains(game_id) && !chosen.contains(game_id))
                .take(limit - picked.len())
                .map(|(game_id, score)| ScoredGame {
                    game_id: *game_id,
                    score: score / top,
                    source: ScoreSource::Popularity,
                })
                .collect::<Vec<_>>();
            picked.extend(fill);
        }

        picked
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        let encoded = serde_json::to_vec(self).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, encoded).await
    }

    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw).map_err(std::io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn trains_on_small_matrix_and_recommends_unseen_game() {
        let users = ids(3);
        let games = ids(3);
        let signal = |u: usize, g: usize, score: f64| Signal {
            user_id: users[u],
            game_id: games[g],
            score,
        };
        let signals = vec![
            signal(0, 0, 5.0),
            signal(0, 1, 3.0),
            signal(1, 0, 4.0),
            signal(1, 2, 2.0),
            signal(2, 1, 5.0),
            signal(2, 2, 4.0),
        ];

        let model = TrainedModel::train(&signals, 20, 5).unwrap();
        assert_eq!(model.n_components, 2);
        assert_eq!(model.interactions, 6);

        let exclude: HashSet<Uuid> = [games[0], games[1]].into_iter().collect();
        let picked = model.recommend(users[0], &exclude, 1);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].game_id, games[2]);
    }

    #[test]
    fn unknown_users_get_popular_games() {
        let users = ids(2);
        let games = ids(2);
        let signals = vec![
            Signal { user_id: users[0], game_id: games[0], score: 1.0 },
            Signal { user_id: users[1], game_id: games[0], score: 1.0 },
            Signal { user_id: users[1], game_id: games[1], score: 5.0 },
        ];
        let model = TrainedModel::train(&signals, 20, 2).unwrap();

        let picked = model.recommend(Uuid::new_v4(), &HashSet::new(), 5);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].game_id, games[1]);
        assert!(picked.iter().all(|game| game.source == ScoreSource::Popularity));
    }

    #[test]
    fn rejects_sparse_input() {
        let one = Signal {
            user_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            score: 1.0,
        };
        assert_eq!(
            TrainedModel::train(&[one, one], 20, 5).unwrap_err(),
            TrainingError::NotEnoughInteractions { required: 5, found: 2 }
        );
        assert!(matches!(
            TrainedModel::train(&[one, one], 20, 2),
            Err(TrainingError::MatrixTooSmall { .. })
        ));
    }
}
