//! A* routing for live agents.
//!
//! Same walkable cells and door rules as the cell search in
//! [`pathfinding`](crate::pathfinding), but with full cost bookkeeping so
//! the returned route is least-cost. A step costs its Manhattan length (a
//! stair counts as the distance it covers) plus the configured trap
//! penalty when it lands on a trap cell.

use crate::config::PathfindingConfig;
use crate::geometry::Position;
use crate::grid::Cell;
use crate::layout::Layout;
use crate::pathfinding::Pathfinder;
use crate::queue::PriorityQueue;
use std::collections::{HashMap, HashSet};

/// Search record for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub position: Position,
    /// Cost from the start.
    pub g: u32,
    /// Estimated cost to the goal.
    pub h: u32,
    pub parent: Option<Position>,
}

impl Node {
    pub fn f(&self) -> u32 {
        self.g + self.h
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentRoute {
    pub cells: Vec<Cell>,
    pub cost: u32,
}

pub struct AgentPathfinder<'a> {
    cells: Pathfinder<'a>,
    config: &'a PathfindingConfig,
}

impl<'a> AgentPathfinder<'a> {
    pub fn new(layout: &'a Layout, config: &'a PathfindingConfig) -> Self {
        Self {
            cells: Pathfinder::new(layout, config),
            config,
        }
    }

    pub fn find_path(&self, start: Position, end: Position) -> Option<Vec<Cell>> {
        self.route(start, end).map(|r| r.cells)
    }

    pub fn route(&self, start: Position, end: Position) -> Option<AgentRoute> {
        let layout = self.cells.layout();
        let grid = &layout.grid;
        if grid.get(start).is_empty() || grid.get(end).is_empty() {
            return None;
        }
        if start == end {
            return Some(AgentRoute {
                cells: vec![grid.get(start)],
                cost: 0,
            });
        }

        let estimate = |p: Position| p.manhattan(end) as u32;
        let budget = self.config.search_budget(start.manhattan(end));
        let mut nodes: HashMap<Position, Node> = HashMap::new();
        let mut closed: HashSet<Position> = HashSet::new();
        let mut open = PriorityQueue::new();

        let first = Node {
            position: start,
            g: 0,
            h: estimate(start),
            parent: None,
        };
        open.enqueue(start, (first.f(), first.h));
        nodes.insert(start, first);

        while let Some((current, _)) = open.dequeue_min() {
            let node = *nodes.get(&current)?;
            if current == end {
                return Some(self.unwind(&nodes, node));
            }
            closed.insert(current);
            if closed.len() > budget {
                log::debug!("agent search {} → {} ran out of budget ({})", start, end, budget);
                return None;
            }

            for next in self.cells.successors(current, None) {
                if closed.contains(&next) {
                    continue;
                }
                let g = node.g + self.step_cost(layout, current, next);
                if nodes.get(&next).is_some_and(|n| n.g <= g) {
                    continue;
                }
                let candidate = Node {
                    position: next,
                    g,
                    h: estimate(next),
                    parent: Some(current),
                };
                open.enqueue(next, (candidate.f(), candidate.h));
                nodes.insert(next, candidate);
            }
        }
        None
    }

    fn step_cost(&self, layout: &Layout, from: Position, to: Position) -> u32 {
        let trap = if layout.is_trap(to) {
            self.config.trap_penalty
        } else {
            0
        };
        from.manhattan(to) as u32 + trap
    }

    fn unwind(&self, nodes: &HashMap<Position, Node>, goal: Node) -> AgentRoute {
        let grid = &self.cells.layout().grid;
        let mut cells = vec![grid.get(goal.position)];
        let mut parent = goal.parent;
        while let Some(pos) = parent {
            cells.push(grid.get(pos));
            parent = nodes.get(&pos).and_then(|n| n.parent);
        }
        cells.reverse();
        AgentRoute {
            cells,
            cost: goal.g,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::tests::{join, row, spawn_piece};
    use crate::pieces::PieceKind;
    use crate::geometry::Cardinal;

    /// 7×5 room with a wall at x=3 from z=0 to z=3.
    fn walled_room() -> Layout {
        let mut layout = Layout::new();
        let cells: Vec<Position> = (0..5)
            .flat_map(|z| row(0, 7, z))
            .filter(|p| !(p.x == 3 && p.z < 4))
            .collect();
        spawn_piece(&mut layout, PieceKind::Room, &cells);
        layout
    }

    #[test]
    fn test_routes_around_wall() {
        let layout = walled_room();
        let config = PathfindingConfig::default();
        let agent = AgentPathfinder::new(&layout, &config);
        let route = agent
            .route(Position::new(2, 0, 0), Position::new(4, 0, 0))
            .unwrap();
        assert_eq!(route.cost, 10);
        assert_eq!(route.cells.len(), 11);

        let greedy = Pathfinder::new(&layout, &config)
            .cell_path(Position::new(2, 0, 0), Position::new(4, 0, 0), None)
            .unwrap();
        assert!(greedy.len() >= route.cells.len());
    }

    #[test]
    fn test_trap_penalty_detours() {
        let mut layout = Layout::new();
        let mut cells = row(0, 5, 0);
        cells.extend(row(0, 5, 1));
        spawn_piece(&mut layout, PieceKind::Hallway, &cells);
        for x in 1..4 {
            layout.mark_trap(Position::new(x, 0, 0));
        }
        let (start, end) = (Position::new(0, 0, 0), Position::new(4, 0, 0));

        let free = PathfindingConfig::default();
        let route = AgentPathfinder::new(&layout, &free).route(start, end).unwrap();
        assert_eq!(route.cost, 4);

        let costly = PathfindingConfig {
            trap_penalty: 10,
            ..Default::default()
        };
        let route = AgentPathfinder::new(&layout, &costly).route(start, end).unwrap();
        assert_eq!(route.cost, 6);
        assert!(route.cells.iter().all(|c| !layout.is_trap(c.position)));
    }

    #[test]
    fn test_crosses_unlocked_doors_only() {
        let mut layout = Layout::new();
        let a = spawn_piece(&mut layout, PieceKind::Room, &row(0, 3, 0));
        let b = spawn_piece(&mut layout, PieceKind::Room, &row(3, 6, 0));
        let door = join(&mut layout, a, Position::new(2, 0, 0), Cardinal::East, b);
        let (start, end) = (Position::new(0, 0, 0), Position::new(5, 0, 0));
        {
            let config = PathfindingConfig::default();
            let route = AgentPathfinder::new(&layout, &config).route(start, end).unwrap();
            assert_eq!(route.cost, 5);
            assert_eq!(route.cells.first().map(|c| c.position), Some(start));
            assert_eq!(route.cells.last().map(|c| c.position), Some(end));
        }
        layout.set_door_locked(door, true).unwrap();
        let config = PathfindingConfig::default();
        assert!(AgentPathfinder::new(&layout, &config).find_path(start, end).is_none());
    }

    #[test]
    fn test_same_cell_costs_nothing() {
        let layout = walled_room();
        let config = PathfindingConfig::default();
        let route = AgentPathfinder::new(&layout, &config)
            .route(Position::new(1, 0, 1), Position::new(1, 0, 1))
            .unwrap();
        assert_eq!(route.cost, 0);
        assert_eq!(route.cells.len(), 1);
    }

    #[test]
    fn test_stairs_cost_their_length() {
        let mut layout = Layout::new();
        let mut cells = row(0, 2, 0);
        cells.extend([Position::new(3, 1, 0), Position::new(4, 1, 0)]);
        spawn_piece(&mut layout, PieceKind::Hallway, &cells);
        layout.link_stair(Position::new(1, 0, 0), Position::new(3, 1, 0));
        let config = PathfindingConfig::default();
        let route = AgentPathfinder::new(&layout, &config)
            .route(Position::new(0, 0, 0), Position::new(4, 1, 0))
            .unwrap();
        assert_eq!(route.cells.len(), 4);
        assert_eq!(route.cost, 5);
    }
}
