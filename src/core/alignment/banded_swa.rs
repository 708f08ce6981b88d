//! Scalar banded Smith-Waterman with affine gaps and traceback.
//!
//! The band is a diagonal strip of the DP matrix: cell (i, j) aligns query
//! base `i` with target base `j` and is evaluated only when
//! `|(j - i) - diag| <= w`. Gap costs follow the convention used by the
//! filter's scoring options: the first base of a gap costs `gap_open`, each
//! further base costs `gap_extend`.

const NEG_INF: i32 = i32::MIN / 4;

// Traceback encoding: low two bits give the source of H, bits 2 and 3 record
// whether E and F were extended rather than opened.
const TB_STOP: u8 = 0;
const TB_DIAG: u8 = 1;
const TB_DEL: u8 = 2;
const TB_INS: u8 = 3;
const TB_H_MASK: u8 = 0b11;
const TB_E_EXT: u8 = 0b100;
const TB_F_EXT: u8 = 0b1000;

/// Fill a 5x5 scoring matrix for A, C, G, T, N.
pub fn fill_scoring_matrix(match_score: i32, mismatch_penalty: i32, ambig_penalty: i32) -> [i32; 25] {
    let mut mat = [0i32; 25];
    let mut k = 0;

    for i in 0..4 {
        for j in 0..4 {
            mat[k] = if i == j {
                match_score
            } else {
                -mismatch_penalty
            };
            k += 1;
        }
        mat[k] = -ambig_penalty;
        k += 1;
    }

    // Last row for N
    for _ in 0..5 {
        mat[k] = -ambig_penalty;
        k += 1;
    }

    mat
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwParams {
    pub mat: [i32; 25],
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl SwParams {
    pub fn new(mat: [i32; 25], gap_open: i32, gap_extend: i32) -> Self {
        Self {
            mat,
            gap_open,
            gap_extend,
        }
    }

    #[inline(always)]
    fn score(&self, q: u8, t: u8) -> i32 {
        let q = q.min(4) as usize;
        let t = t.min(4) as usize;
        self.mat[q * 5 + t]
    }
}

/// Best local alignment inside the band.
///
/// Coordinates are 0-based, ends exclusive. The CIGAR covers the whole query:
/// unaligned query ends are reported as soft clips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwAlignment {
    pub score: i32,
    pub query_begin: usize,
    pub query_end: usize,
    pub target_begin: usize,
    pub target_end: usize,
    pub cigar: Vec<(u8, i32)>,
}

/// Band geometry. Row `i` holds the cells `j = i + diag - w + k` for
/// `k in 0..width`; the diagonal predecessor of a cell shares its `k`, the
/// cell above sits at `k + 1` and the cell to the left at `k - 1`.
#[derive(Clone, Copy)]
struct Band {
    diag: i64,
    w: i64,
    width: usize,
}

impl Band {
    fn new(diag: i32, w: i32) -> Self {
        let w = w.max(0) as i64;
        Self {
            diag: diag as i64,
            w,
            width: (2 * w + 1) as usize,
        }
    }

    /// Target column of band slot `k` in row `i`
    #[inline(always)]
    fn column(&self, i: usize, k: usize) -> i64 {
        i as i64 + self.diag - self.w + k as i64
    }

    /// Traceback slot of cell (i, j), if it lies inside the band
    #[inline(always)]
    fn slot(&self, i: usize, j: usize) -> Option<usize> {
        let k = j as i64 - (i as i64 + self.diag - self.w);
        (0..self.width as i64)
            .contains(&k)
            .then(|| i * self.width + k as usize)
    }
}

/// Run the banded local alignment of `query` against `target`.
///
/// `diag` is the expected offset `target_pos - query_pos` of the alignment and
/// `w` the half-width of the band around it. Memory is proportional to
/// `query.len() * (2w + 1)`.
pub fn banded_local_align(
    params: &SwParams,
    query: &[u8],
    target: &[u8],
    diag: i32,
    w: i32,
) -> SwAlignment {
    let m = query.len();
    let n = target.len() as i64;
    if m == 0 || n == 0 {
        return SwAlignment::default();
    }

    let band = Band::new(diag, w);
    let width = band.width;
    let mut tb = vec![TB_STOP; (m + 1) * width];
    // One spare slot so the cell above the last slot reads as outside the band
    let mut h_prev = vec![0i32; width + 1];
    let mut h_cur = vec![0i32; width + 1];
    let mut f_prev = vec![NEG_INF; width + 1];
    let mut f_cur = vec![NEG_INF; width + 1];

    let mut best = 0i32;
    let mut best_i = 0usize;
    let mut best_j = 0usize;

    for i in 1..=m {
        h_cur.fill(0);
        f_cur.fill(NEG_INF);
        let q = query[i - 1];
        let mut e = NEG_INF;
        let mut h_left = 0i32;

        for k in 0..width {
            let j = band.column(i, k);
            if j < 1 {
                continue;
            }
            if j > n {
                break;
            }
            let j = j as usize;
            let mut flags = 0u8;

            // E: gap consuming target (deletion from the read)
            let e_open = h_left - params.gap_open;
            let e_ext = e - params.gap_extend;
            if e_ext > e_open {
                e = e_ext;
                flags |= TB_E_EXT;
            } else {
                e = e_open;
            }

            // F: gap consuming query (insertion in the read)
            let f_open = h_prev[k + 1] - params.gap_open;
            let f_ext = f_prev[k + 1] - params.gap_extend;
            let f = if f_ext > f_open {
                flags |= TB_F_EXT;
                f_ext
            } else {
                f_open
            };

            let d = h_prev[k] + params.score(q, target[j - 1]);

            let (h, src) = if d > 0 && d >= e && d >= f {
                (d, TB_DIAG)
            } else if e > 0 && e >= f {
                (e, TB_DEL)
            } else if f > 0 {
                (f, TB_INS)
            } else {
                (0, TB_STOP)
            };

            h_cur[k] = h;
            f_cur[k] = f;
            tb[i * width + k] = flags | src;
            h_left = h;

            if h > best {
                best = h;
                best_i = i;
                best_j = j;
            }
        }

        std::mem::swap(&mut h_prev, &mut h_cur);
        std::mem::swap(&mut f_prev, &mut f_cur);
    }

    if best == 0 {
        return SwAlignment::default();
    }

    let (ops, qb, tbeg) = traceback(&tb, band, best_i, best_j);

    let mut cigar = Vec::with_capacity(ops.len() + 2);
    if qb > 0 {
        cigar.push((b'S', qb as i32));
    }
    cigar.extend(ops);
    if best_i < m {
        cigar.push((b'S', (m - best_i) as i32));
    }

    SwAlignment {
        score: best,
        query_begin: qb,
        query_end: best_i,
        target_begin: tbeg,
        target_end: best_j,
        cigar,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TbState {
    H,
    E,
    F,
}

/// Walk back from the best cell. Returns run-length ops in forward order and
/// the 0-based query/target begin positions.
fn traceback(tb: &[u8], band: Band, mut i: usize, mut j: usize) -> (Vec<(u8, i32)>, usize, usize) {
    let mut rev_ops: Vec<u8> = Vec::new();
    let mut state = TbState::H;

    while i > 0 && j > 0 {
        let Some(slot) = band.slot(i, j) else {
            break;
        };
        let cell = tb[slot];
        match state {
            TbState::H => match cell & TB_H_MASK {
                TB_DIAG => {
                    rev_ops.push(b'M');
                    i -= 1;
                    j -= 1;
                }
                TB_DEL => state = TbState::E,
                TB_INS => state = TbState::F,
                _ => break,
            },
            TbState::E => {
                rev_ops.push(b'D');
                if cell & TB_E_EXT == 0 {
                    state = TbState::H;
                }
                j -= 1;
            }
            TbState::F => {
                rev_ops.push(b'I');
                if cell & TB_F_EXT == 0 {
                    state = TbState::H;
                }
                i -= 1;
            }
        }
    }

    let mut ops: Vec<(u8, i32)> = Vec::new();
    for &op in rev_ops.iter().rev() {
        match ops.last_mut() {
            Some((last, len)) if *last == op => *len += 1,
            _ => ops.push((op, 1)),
        }
    }

    (ops, i, j)
}
