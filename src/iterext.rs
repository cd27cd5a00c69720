pub trait IterExt: Iterator {
    /// Edits every item in place, in iteration order, threading an
    /// accumulator through so earlier items can influence later ones.
    fn edit_with<S, F>(self, state: S, f: F) -> impl Iterator<Item = Self::Item>
    where
        Self: Sized,
        F: FnMut(&mut S, &mut Self::Item);
}

impl<T: Iterator> IterExt for T {
    fn edit_with<S, F>(self, mut state: S, mut f: F) -> impl Iterator<Item = Self::Item>
    where
        Self: Sized,
        F: FnMut(&mut S, &mut Self::Item),
    {
        self.map(move |mut x| {
            f(&mut state, &mut x);
            x
        })
    }
}
