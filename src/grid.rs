use std::fmt::{self, Display, Formatter};

use crate::slot::SlotSpec;
use crate::{Direction, Error, GridCoord, Pattern, Result};

/// One cell of the grid snapshot handed in by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellInput {
    pub letter: Option<char>,
    pub blocked: bool,
    pub void: bool,
    pub bar_top: bool,
    pub bar_left: bool,
}

/// A dense row-major grid snapshot, as supplied by the surrounding puzzle model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridInput {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<CellInput>,
}

impl GridInput {
    /// An open grid with every cell empty.
    pub fn new(width: usize, height: usize) -> GridInput {
        GridInput { width, height, cells: vec![CellInput::default(); width * height] }
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut CellInput {
        &mut self.cells[x + y * self.width]
    }

    /// Build a grid from a string template, with `.` representing empty cells, `#` representing
    /// blocks, `~` representing void cells, and letters representing themselves.
    pub fn from_template(template: &str) -> Result<GridInput> {
        let rows: Vec<Vec<char>> = template.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(line.chars().collect())
            }
        }).collect();

        let width = rows.first().ok_or(Error::EmptyTemplate)?.len();
        let mut cells = Vec::with_capacity(width * rows.len());

        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::RaggedTemplate { row: y, expected: width, actual: row.len() });
            }

            for (x, &c) in row.iter().enumerate() {
                cells.push(match c {
                    '.' => CellInput::default(),
                    '#' => CellInput { blocked: true, ..CellInput::default() },
                    '~' => CellInput { void: true, ..CellInput::default() },
                    c if c.is_ascii_alphabetic() => CellInput { letter: Some(c), ..CellInput::default() },
                    letter => return Err(Error::InvalidLetter { x, y, letter }),
                });
            }
        }

        Ok(GridInput { width, height: rows.len(), cells })
    }
}

/// One grid position as tracked during filling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub letter: Option<u8>,
    pub blocked: bool,
    pub void: bool,
    /// Pre-filled by the author; never overwritten by the solver.
    pub fixed: bool,
    pub top_bar: bool,
    pub left_bar: bool,
    pub number: u32,
}

/// The mutable letter grid plus its structural flags. This is the single source of truth for
/// which letter is currently placed where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Import a grid snapshot. Every cell that already holds a letter becomes fixed.
    pub fn load(input: &GridInput) -> Result<Grid> {
        let expected = input.width * input.height;
        if input.cells.len() != expected {
            return Err(Error::GridSizeMismatch {
                width: input.width,
                height: input.height,
                expected,
                actual: input.cells.len(),
            });
        }

        let cells = input.cells.iter().enumerate().map(|(idx, cell)| {
            let (x, y) = (idx % input.width, idx / input.width);

            let letter = match cell.letter {
                Some(letter) if cell.blocked || cell.void => {
                    return Err(Error::InvalidLetter { x, y, letter });
                }
                Some(letter) if letter.is_ascii_alphabetic() => Some(letter.to_ascii_lowercase() as u8),
                Some(letter) => return Err(Error::InvalidLetter { x, y, letter }),
                None => None,
            };

            Ok(Cell {
                letter,
                blocked: cell.blocked,
                void: cell.void,
                fixed: letter.is_some(),
                top_bar: cell.bar_top,
                left_bar: cell.bar_left,
                number: 0,
            })
        }).collect::<Result<Vec<Cell>>>()?;

        Ok(Grid { width: input.width, height: input.height, cells })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, (x, y): GridCoord) -> &Cell {
        &self.cells[x + y * self.width]
    }

    pub fn letter(&self, coord: GridCoord) -> Option<u8> {
        self.cell(coord).letter
    }

    /// Is this position inside the grid and neither blocked nor void?
    pub fn is_available(&self, (x, y): GridCoord) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let cell = self.cell((x, y));
        !cell.blocked && !cell.void
    }

    /// Does this cell have a bar on the side that a word in `direction` enters it through?
    pub fn has_bar(&self, coord: GridCoord, direction: Direction) -> bool {
        let cell = self.cell(coord);
        match direction {
            Direction::Across => cell.left_bar,
            Direction::Down => cell.top_bar,
        }
    }

    /// The cell before `coord` in `direction`, if there is one.
    fn before(coord: GridCoord, direction: Direction) -> Option<GridCoord> {
        match direction {
            Direction::Across => coord.0.checked_sub(1).map(|x| (x, coord.1)),
            Direction::Down => coord.1.checked_sub(1).map(|y| (coord.0, y)),
        }
    }

    /// Does a word of at least two letters begin here in `direction`?
    pub fn is_start_word(&self, coord: GridCoord, direction: Direction) -> bool {
        if !self.is_available(coord) {
            return false;
        }

        let after = direction.advance(coord, 1);
        if !self.is_available(after) || self.has_bar(after, direction) {
            return false;
        }

        match Grid::before(coord, direction) {
            Some(before) => !self.is_available(before) || self.has_bar(coord, direction),
            None => true,
        }
    }

    /// Count writable cells from `start` in `direction`, stopping at an unavailable cell or a
    /// bar.
    pub fn run_length(&self, start: GridCoord, direction: Direction) -> usize {
        let mut length = 0;

        while self.is_available(direction.advance(start, length))
            && (length == 0 || !self.has_bar(direction.advance(start, length), direction))
        {
            length += 1;
        }

        length
    }

    /// Derive the slot table: every across word in row-major order, then every down word.
    pub fn derive_slots(&self) -> Vec<SlotSpec> {
        let mut slots = vec![];

        for direction in [Direction::Across, Direction::Down] {
            for y in 0..self.height {
                for x in 0..self.width {
                    if self.is_start_word((x, y), direction) {
                        slots.push(SlotSpec::new(x, y, direction, self.run_length((x, y), direction)));
                    }
                }
            }
        }

        slots
    }

    /// Number every cell that starts a word in either direction, row by row.
    pub fn assign_numbers(&mut self) {
        let mut n = 1;

        for y in 0..self.height {
            for x in 0..self.width {
                let starts = self.is_start_word((x, y), Direction::Across)
                    || self.is_start_word((x, y), Direction::Down);

                self.cells[x + y * self.width].number = if starts {
                    n += 1;
                    n - 1
                } else {
                    0
                };
            }
        }
    }

    /// Write a letter. Fixed cells are left alone.
    pub fn place(&mut self, (x, y): GridCoord, letter: u8) {
        let cell = &mut self.cells[x + y * self.width];
        debug_assert!(!cell.fixed || cell.letter == Some(letter), "overwriting fixed cell");

        if !cell.fixed {
            cell.letter = Some(letter);
        }
    }

    /// Empty a cell. Fixed cells are left alone.
    pub fn clear(&mut self, (x, y): GridCoord) {
        let cell = &mut self.cells[x + y * self.width];

        if !cell.fixed {
            cell.letter = None;
        }
    }

    /// Read the current contents of a slot as a pattern. Reading stops early at a bar, leaving
    /// the rest of the pattern as wildcards.
    pub fn read_pattern(&self, start: GridCoord, direction: Direction, length: usize) -> Pattern {
        let mut pattern = Pattern::wildcards(length);

        for offset in 0..length {
            let coord = direction.advance(start, offset);
            if !self.is_available(coord) || (offset > 0 && self.has_bar(coord, direction)) {
                break;
            }
            pattern.set(offset, self.letter(coord));
        }

        pattern
    }

    /// Every letter the solver has placed, as `(x, y, letter)` in row-major order.
    pub fn snapshot_fill(&self) -> Vec<(usize, usize, char)> {
        self.cells.iter().enumerate().filter_map(|(idx, cell)| {
            match cell.letter {
                Some(letter) if !cell.fixed => {
                    Some((idx % self.width, idx / self.width, letter as char))
                }
                _ => None,
            }
        }).collect()
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.cells.chunks(self.width.max(1)).map(|row| {
            row.iter().map(|cell| {
                if cell.blocked {
                    '#'
                } else if cell.void {
                    ' '
                } else {
                    cell.letter.map(|letter| letter as char).unwrap_or('.')
                }
            }).collect()
        }).collect();

        write!(f, "{}", rows.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use crate::grid::{CellInput, Grid, GridInput};
    use crate::{Direction, Error};

    #[test]
    fn test_load_marks_prefilled_cells_fixed() {
        let grid = Grid::load(&GridInput::from_template("
            c.#
            .~t
        ").unwrap()).unwrap();

        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert!(grid.cell((0, 0)).fixed);
        assert!(!grid.cell((1, 0)).fixed);
        assert!(grid.cell((2, 0)).blocked);
        assert!(grid.cell((1, 1)).void);
        assert_eq!(grid.letter((2, 1)), Some(b't'));
    }

    #[test]
    fn test_load_rejects_malformed_input() {
        let mut input = GridInput::new(2, 2);
        input.cells.pop();
        assert_eq!(
            Grid::load(&input),
            Err(Error::GridSizeMismatch { width: 2, height: 2, expected: 4, actual: 3 })
        );

        let mut input = GridInput::new(2, 2);
        input.cell_mut(1, 1).letter = Some('7');
        assert_eq!(Grid::load(&input), Err(Error::InvalidLetter { x: 1, y: 1, letter: '7' }));

        assert_eq!(GridInput::from_template("\n  \n"), Err(Error::EmptyTemplate));
        assert_eq!(
            GridInput::from_template("...\n.."),
            Err(Error::RaggedTemplate { row: 1, expected: 3, actual: 2 })
        );
    }

    #[test]
    fn test_place_and_clear_respect_fixed_cells() {
        let mut grid = Grid::load(&GridInput::from_template("c..").unwrap()).unwrap();

        grid.place((1, 0), b'a');
        grid.clear((0, 0));
        assert_eq!(grid.read_pattern((0, 0), Direction::Across, 3).to_string(), "ca.");
        assert_eq!(grid.snapshot_fill(), vec![(1, 0, 'a')]);

        grid.clear((1, 0));
        assert!(grid.snapshot_fill().is_empty());
    }

    /// ..#
    /// ...
    /// #..
    #[test]
    fn test_derive_slots_and_numbers() {
        let mut grid = Grid::load(&GridInput::from_template("
            ..#
            ...
            #..
        ").unwrap()).unwrap();

        let slots: Vec<_> = grid.derive_slots().iter()
            .map(|slot| (slot.x, slot.y, slot.direction, slot.length))
            .collect();
        assert_eq!(slots, vec![
            (0, 0, Direction::Across, 2),
            (0, 1, Direction::Across, 3),
            (1, 2, Direction::Across, 2),
            (0, 0, Direction::Down, 2),
            (1, 0, Direction::Down, 3),
            (2, 1, Direction::Down, 2),
        ]);

        grid.assign_numbers();
        assert_eq!(grid.cell((0, 0)).number, 1);
        assert_eq!(grid.cell((1, 0)).number, 2);
        assert_eq!(grid.cell((0, 1)).number, 3);
        assert_eq!(grid.cell((2, 1)).number, 4);
        assert_eq!(grid.cell((1, 2)).number, 5);
        assert_eq!(grid.cell((1, 1)).number, 0);
    }

    #[test]
    fn test_bars_split_runs() {
        let mut input = GridInput::new(4, 1);
        *input.cell_mut(2, 0) = CellInput { bar_left: true, ..CellInput::default() };
        input.cell_mut(3, 0).letter = Some('x');
        let grid = Grid::load(&input).unwrap();

        assert!(grid.is_start_word((0, 0), Direction::Across));
        assert!(grid.is_start_word((2, 0), Direction::Across));
        assert_eq!(grid.run_length((0, 0), Direction::Across), 2);
        assert_eq!(grid.run_length((2, 0), Direction::Across), 2);
        assert_eq!(grid.read_pattern((0, 0), Direction::Across, 4).to_string(), "....");
        assert_eq!(grid.read_pattern((2, 0), Direction::Across, 2).to_string(), ".x");
        assert_eq!(grid.derive_slots().len(), 2);
    }

    #[test]
    fn test_display() {
        let grid = Grid::load(&GridInput::from_template("a.#\n~b.").unwrap()).unwrap();
        assert_eq!(grid.to_string(), "a.#\n b.");
    }
}
